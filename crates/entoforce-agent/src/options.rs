// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Constrained option sets offered as choices during intake.

use entoforce_core::ChoiceOption;

/// `(label, value)` pairs. The value is what gets stored.
pub type OptionSet = &'static [(&'static str, &'static str)];

pub const GREETING: OptionSet = &[("Let's start", "start")];

pub const OBJECT_TYPES: OptionSet = &[
    ("Apartment", "apartment"),
    ("Private house", "house"),
    ("Office", "office"),
    ("Other premises", "other"),
];

pub const INSECT_QUANTITIES: OptionSet = &[
    ("Just a few", "few"),
    ("Quite a lot", "moderate"),
    ("Very many", "many"),
];

pub const EXPERIENCE: OptionSet = &[("Yes", "yes"), ("No", "no")];

pub const CHEMICAL_TYPES: OptionSet = &[
    ("Insecticide concentrate", "insecticide"),
    ("Gel bait", "gel"),
    ("Aerosol", "aerosol"),
];

pub const POISON_TYPES: OptionSet = &[
    ("Contact", "contact"),
    ("Intestinal", "intestinal"),
    ("Fumigant", "fumigant"),
];

pub const INSECT_TYPES: OptionSet = &[
    ("Cockroaches", "cockroaches"),
    ("Bedbugs", "bedbugs"),
    ("Ants", "ants"),
    ("Fleas", "fleas"),
];

/// Render an option set as choices.
pub fn choices(set: OptionSet) -> Vec<ChoiceOption> {
    set.iter()
        .map(|(label, value)| ChoiceOption::new(*label, *value))
        .collect()
}

/// Match input against a set by value or label, ignoring case.
///
/// Transports without buttons send the label as text, so both are accepted.
pub fn resolve(set: OptionSet, input: &str) -> Option<&'static str> {
    let input = input.trim();
    set.iter()
        .find(|(label, value)| value.eq_ignore_ascii_case(input) || label.eq_ignore_ascii_case(input))
        .map(|(_, value)| *value)
}
