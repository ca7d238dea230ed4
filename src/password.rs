// 🔐 Password Policy - Signup validation and strength meter
// Five fixed rules checked independently, plus a 0-4 strength score

use serde::{Deserialize, Serialize};

/// Characters accepted by the special-character rule
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

pub const MIN_LENGTH: usize = 8;
pub const STRONG_LENGTH: usize = 12;
pub const MAX_STRENGTH: u8 = 4;

// ============================================================================
// RULES
// ============================================================================

/// One rule of the password policy, in the order they are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordRule {
    MinLength,
    Uppercase,
    Lowercase,
    Digit,
    SpecialCharacter,
}

impl PasswordRule {
    pub const ALL: [PasswordRule; 5] = [
        PasswordRule::MinLength,
        PasswordRule::Uppercase,
        PasswordRule::Lowercase,
        PasswordRule::Digit,
        PasswordRule::SpecialCharacter,
    ];

    /// Message reported when the rule is violated
    pub fn error_message(&self) -> &'static str {
        match self {
            PasswordRule::MinLength => "Password must be at least 8 characters long",
            PasswordRule::Uppercase => "Password must contain at least one uppercase letter",
            PasswordRule::Lowercase => "Password must contain at least one lowercase letter",
            PasswordRule::Digit => "Password must contain at least one number",
            PasswordRule::SpecialCharacter => "Password must contain at least one special character",
        }
    }

    /// Short label for the requirement checklist
    pub fn label(&self) -> &'static str {
        match self {
            PasswordRule::MinLength => "At least 8 characters",
            PasswordRule::Uppercase => "One uppercase letter",
            PasswordRule::Lowercase => "One lowercase letter",
            PasswordRule::Digit => "One number",
            PasswordRule::SpecialCharacter => "One special character",
        }
    }

    pub fn is_satisfied_by(&self, password: &str) -> bool {
        let classes = CharacterClasses::scan(password);
        self.is_satisfied(&classes)
    }

    fn is_satisfied(&self, classes: &CharacterClasses) -> bool {
        match self {
            PasswordRule::MinLength => classes.length >= MIN_LENGTH,
            PasswordRule::Uppercase => classes.uppercase,
            PasswordRule::Lowercase => classes.lowercase,
            PasswordRule::Digit => classes.digit,
            PasswordRule::SpecialCharacter => classes.special,
        }
    }
}

/// Single pass over the password collecting everything the rules need
#[derive(Debug, Default)]
struct CharacterClasses {
    length: usize,
    uppercase: bool,
    lowercase: bool,
    digit: bool,
    special: bool,
}

impl CharacterClasses {
    fn scan(password: &str) -> Self {
        password.chars().fold(CharacterClasses::default(), |mut classes, c| {
            classes.length += 1;
            classes.uppercase |= c.is_ascii_uppercase();
            classes.lowercase |= c.is_ascii_lowercase();
            classes.digit |= c.is_ascii_digit();
            classes.special |= SPECIAL_CHARACTERS.contains(c);
            classes
        })
    }
}

// ============================================================================
// VALIDATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Strength meter wording shown next to the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrengthLabel {
    None,
    Weak,
    Good,
    Strong,
}

impl StrengthLabel {
    pub fn from_score(score: u8) -> Self {
        match score {
            0 => StrengthLabel::None,
            1 | 2 => StrengthLabel::Weak,
            3 => StrengthLabel::Good,
            _ => StrengthLabel::Strong,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            StrengthLabel::None => "",
            StrengthLabel::Weak => "Weak",
            StrengthLabel::Good => "Good",
            StrengthLabel::Strong => "Strong",
        }
    }
}

// ============================================================================
// POLICY ENGINE
// ============================================================================

/// Validate a candidate password against all five rules.
///
/// Every rule is evaluated, so the errors list the full set of missing
/// requirements in rule order. The empty string fails all five.
pub fn validate(password: &str) -> PasswordValidationResult {
    let classes = CharacterClasses::scan(password);

    let errors: Vec<String> = PasswordRule::ALL
        .iter()
        .filter(|rule| !rule.is_satisfied(&classes))
        .map(|rule| rule.error_message().to_string())
        .collect();

    PasswordValidationResult {
        is_valid: errors.is_empty(),
        errors,
    }
}

/// Score password complexity on a 0-4 scale.
///
/// Independent of `validate`: one point each for reaching 8 characters,
/// reaching 12 characters, mixing upper and lower case, containing a digit
/// and containing a special character, capped at 4.
pub fn strength(password: &str) -> u8 {
    let classes = CharacterClasses::scan(password);

    let points = [
        classes.length >= MIN_LENGTH,
        classes.length >= STRONG_LENGTH,
        classes.uppercase && classes.lowercase,
        classes.digit,
        classes.special,
    ]
    .iter()
    .filter(|&&earned| earned)
    .count() as u8;

    points.min(MAX_STRENGTH)
}

/// Checklist of every rule with whether the password satisfies it
pub fn requirements(password: &str) -> Vec<(PasswordRule, bool)> {
    let classes = CharacterClasses::scan(password);
    PasswordRule::ALL
        .iter()
        .map(|rule| (*rule, rule.is_satisfied(&classes)))
        .collect()
}
