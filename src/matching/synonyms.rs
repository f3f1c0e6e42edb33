// src/matching/synonyms.rs
//! Synonym tables for the well-known profile attributes, English first,
//! then French, Spanish and German equivalents.

const SYNONYMS: &[(&str, &[&str])] = &[
    (
        "first_name",
        &[
            "first name", "first_name", "firstname", "fname", "given name", "givenname",
            "forename", "prénom", "nombre", "vorname",
        ],
    ),
    (
        "last_name",
        &[
            "last name", "last_name", "lastname", "lname", "surname", "family name",
            "familyname", "nom", "apellido", "nachname",
        ],
    ),
    (
        "full_name",
        &[
            "full name", "full_name", "fullname", "name", "your name", "complete name",
            "nom complet", "nombre completo",
        ],
    ),
    (
        "email",
        &[
            "email", "e-mail", "email address", "email_address", "mail", "electronic mail",
            "correo electrónico", "courriel",
        ],
    ),
    (
        "phone",
        &[
            "phone", "phone number", "phone_number", "phonenumber", "telephone", "tel",
            "mobile", "cell", "contact number", "contact_number", "téléphone", "teléfono",
            "telefon",
        ],
    ),
    (
        "address",
        &[
            "address", "street address", "street_address", "address line 1",
            "address_line_1", "street", "adresse", "dirección",
        ],
    ),
    (
        "address2",
        &[
            "address line 2", "address_line_2", "apartment", "apt", "suite", "unit",
            "building", "floor",
        ],
    ),
    ("city", &["city", "town", "ville", "ciudad", "stadt"]),
    (
        "state",
        &["state", "province", "region", "state/province", "état", "estado"],
    ),
    (
        "zip",
        &[
            "zip", "zip code", "zipcode", "zip_code", "postal code", "postalcode",
            "postal_code", "postcode", "code postal", "código postal",
        ],
    ),
    ("country", &["country", "nation", "pays", "país", "land"]),
    (
        "linkedin",
        &["linkedin", "linkedin url", "linkedin profile", "linkedin.com", "linked in"],
    ),
    (
        "github",
        &["github", "github url", "github profile", "github username", "github.com"],
    ),
    (
        "portfolio",
        &[
            "portfolio", "website", "personal website", "personal site", "portfolio url",
            "portfolio link", "site web", "sitio web",
        ],
    ),
    (
        "resume",
        &["resume", "cv", "curriculum vitae", "résumé", "curriculum", "lebenslauf"],
    ),
    (
        "cover_letter",
        &[
            "cover letter", "coverletter", "cover_letter", "lettre de motivation",
            "carta de presentación",
        ],
    ),
];

/// Synonyms for a profile key. Keys without a table match by their own name,
/// with underscores also tried as spaces.
pub fn synonyms_for(key: &str) -> Vec<String> {
    match SYNONYMS.iter().find(|(k, _)| *k == key) {
        Some((_, list)) => list.iter().map(|s| s.to_string()).collect(),
        None => {
            let mut list = vec![key.to_lowercase()];
            let spaced = key.replace('_', " ").to_lowercase();
            if spaced != list[0] {
                list.push(spaced);
            }
            list
        }
    }
}

pub fn known_keys() -> impl Iterator<Item = &'static str> {
    SYNONYMS.iter().map(|(k, _)| *k)
}
