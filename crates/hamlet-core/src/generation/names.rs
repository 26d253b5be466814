//! Name generation utilities

use crate::components::Name;
use rand::Rng;

/// Generate a random villager name
pub fn generate_name(rng: &mut impl Rng) -> Name {
    let given = GIVEN_NAMES[rng.gen_range(0..GIVEN_NAMES.len())];
    let family = FAMILY_NAMES[rng.gen_range(0..FAMILY_NAMES.len())];

    Name::new(given, family)
}

static GIVEN_NAMES: &[&str] = &[
    "Jeanne", "Pierre", "Marie", "Jacques", "Agnès", "Guillaume", "Isabeau", "Thomas",
    "Margot", "Étienne", "Alix", "Colin", "Perrine", "Gautier", "Mahaut", "Robin",
    "Aelis", "Baudouin", "Clémence", "Denis", "Ermengarde", "Fulbert", "Gisèle", "Hugues",
    "Ida", "Josse", "Laurette", "Martin", "Nicole", "Odo", "Pernelle", "Renaud",
    "Sibylle", "Thibaut", "Ursule", "Yvain",
];

static FAMILY_NAMES: &[&str] = &[
    "Morel", "Fabre", "Meunier", "Boulanger", "Charpentier", "Lefèvre", "Berger", "Marchand",
    "Tessier", "Vigneron", "Dubois", "Delaroche", "Fournier", "Pêcheur", "Carrier", "Potier",
    "Chevalier", "Bouvier", "Tonnelier", "Forestier", "Laboureur", "Mercier", "Sabatier", "Roux",
];
