use crate::error::StatsError;

pub struct StatsConfig {
    pub cal_params: bool,
    pub cal_flops: bool,
    pub cal_activations: bool,
    pub logging_to_stdout: bool,
    // Width of the '#' bar drawn for the largest entry of each table
    pub bar_length_max: usize,
    // Compute threads for concrete inputs, None for one per core
    pub threads: Option<usize>,
}

impl StatsConfig {
    pub fn build(self) -> Result<Self, StatsError> {
        if !(self.cal_params || self.cal_flops || self.cal_activations) {
            return Err(StatsError::InvalidConfig(
                "at least one of params, flops or activations must be calculated".into()
            ));
        }
        if self.bar_length_max == 0 {
            return Err(StatsError::InvalidConfig("bar_length_max must be non-zero".into()));
        }
        if self.threads == Some(0) {
            return Err(StatsError::InvalidConfig("threads must be non-zero".into()));
        }

        Ok(self)
    }

    // Everything enabled, nothing printed
    pub fn quiet() -> Self {
        Self {
            logging_to_stdout: false,
            ..Default::default()
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            cal_params: true,
            cal_flops: true,
            cal_activations: true,
            logging_to_stdout: true,
            bar_length_max: 20,
            threads: None,
        }
    }
}
