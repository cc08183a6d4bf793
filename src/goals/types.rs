use crate::nutrition::types::choice_enum;

choice_enum!(GoalType, "goal_type", {
    WeightLoss => "weight_loss",
    WeightGain => "weight_gain",
    MuscleGain => "muscle_gain",
    Maintenance => "maintenance",
    Endurance => "endurance",
});

choice_enum!(Metric, "body_metric", {
    WeightKg => "weight_kg",
    WaistCm => "waist_cm",
    HipCm => "hip_cm",
    NeckCm => "neck_cm",
    BodyFatPercentage => "body_fat_percentage",
    MuscleMassPercentage => "muscle_mass_percentage",
    BmiValue => "bmi_value",
});

choice_enum!(MeasurementUnit, "measurement_unit", {
    Kg => "kg",
    Cm => "cm",
    Percent => "percent",
    Index => "index",
});

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::WeightKg,
        Metric::WaistCm,
        Metric::HipCm,
        Metric::NeckCm,
        Metric::BodyFatPercentage,
        Metric::MuscleMassPercentage,
        Metric::BmiValue,
    ];

    /// The unit a measurement of this metric is recorded in.
    pub fn canonical_unit(&self) -> MeasurementUnit {
        match self {
            Metric::WeightKg => MeasurementUnit::Kg,
            Metric::WaistCm | Metric::HipCm | Metric::NeckCm => MeasurementUnit::Cm,
            Metric::BodyFatPercentage | Metric::MuscleMassPercentage => MeasurementUnit::Percent,
            Metric::BmiValue => MeasurementUnit::Index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_metric_has_a_unit() {
        for metric in Metric::ALL {
            // Exhaustiveness is enforced by the match; exercise it anyway.
            let _ = metric.canonical_unit();
        }
        assert_eq!(Metric::WeightKg.canonical_unit(), MeasurementUnit::Kg);
        assert_eq!(Metric::WaistCm.canonical_unit(), MeasurementUnit::Cm);
        assert_eq!(
            Metric::BodyFatPercentage.canonical_unit(),
            MeasurementUnit::Percent
        );
        assert_eq!(Metric::BmiValue.canonical_unit(), MeasurementUnit::Index);
    }

    #[test]
    fn goal_type_parses_known_values() {
        assert_eq!("weight_loss".parse::<GoalType>(), Ok(GoalType::WeightLoss));
        assert!("get_swole".parse::<GoalType>().is_err());
    }
}
