/// Closed choice sets, parsed from client strings at the DTO boundary and
/// stored as Postgres enums.

macro_rules! choice_enum {
    ($name:ident, $pg_type:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq,
            ::serde::Serialize, ::serde::Deserialize, ::sqlx::Type,
        )]
        #[serde(rename_all = "snake_case")]
        #[sqlx(type_name = $pg_type, rename_all = "snake_case")]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub const CHOICES: &'static [&'static str] = &[$($text),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(()),
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use choice_enum;

choice_enum!(MealType, "meal_type", {
    Breakfast => "breakfast",
    Lunch => "lunch",
    Dinner => "dinner",
    Snack => "snack",
});

choice_enum!(RecurrenceType, "recurrence_type", {
    None => "none",
    Daily => "daily",
    Weekly => "weekly",
    Monthly => "monthly",
});

choice_enum!(IngredientUnit, "ingredient_unit", {
    G => "g",
    Ml => "ml",
    Piece => "piece",
});

choice_enum!(PreferenceType, "preference_type", {
    Love => "love",
    Like => "like",
    Dislike => "dislike",
    Hate => "hate",
    Restriction => "restriction",
    Allergy => "allergy",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meal_type_round_trips_through_str() {
        for &text in MealType::CHOICES {
            let parsed: MealType = text.parse().unwrap();
            assert_eq!(parsed.as_str(), text);
        }
    }

    #[test]
    fn unknown_choice_is_rejected() {
        assert!("brunch".parse::<MealType>().is_err());
        assert!("yearly".parse::<RecurrenceType>().is_err());
        assert!("kg".parse::<IngredientUnit>().is_err());
        assert!("meh".parse::<PreferenceType>().is_err());
    }

    #[test]
    fn serde_uses_snake_case_strings() {
        let json = serde_json::to_string(&MealType::Breakfast).unwrap();
        assert_eq!(json, "\"breakfast\"");
        let back: MealType = serde_json::from_str("\"snack\"").unwrap();
        assert_eq!(back, MealType::Snack);
    }
}
