use serde::Deserialize;

/// Knobs that change how an application is bound and activated.
///
/// Options deserialize from any serde format; missing fields take their
/// defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct BindingOptions {
    pub ambiguity: AmbiguityPolicy,
    pub activation: ActivationPolicy,
}

impl BindingOptions {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_ambiguity(mut self, ambiguity: AmbiguityPolicy) -> Self {
        self.ambiguity = ambiguity;
        self
    }

    pub fn with_activation(mut self, activation: ActivationPolicy) -> Self {
        self.activation = activation;
        self
    }
}

/// What to do when a single service reference matches several services and
/// no qualifier narrows them down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Use the first candidate in visibility order and log a warning.
    #[default]
    FirstDeclared,
    /// Report a binding failure.
    Reject,
}

/// When services are activated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationPolicy {
    /// On first use, plus services declared with `instantiate_on_startup`.
    #[default]
    Lazy,
    /// Every service when the application is activated.
    Eager,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_options_deserialize_succeeds() {
        let options: BindingOptions =
            serde_json::from_str(r#"{ "ambiguity": "reject", "activation": "eager" }"#).unwrap();

        assert_eq!(
            options,
            BindingOptions::new()
                .with_ambiguity(AmbiguityPolicy::Reject)
                .with_activation(ActivationPolicy::Eager)
        );
    }

    #[test]
    fn binding_options_deserialize_uses_defaults_for_missing_fields() {
        let options: BindingOptions = serde_json::from_str(r#"{ "activation": "eager" }"#).unwrap();

        assert_eq!(options.ambiguity, AmbiguityPolicy::FirstDeclared);
        assert_eq!(options.activation, ActivationPolicy::Eager);
        assert!(serde_json::from_str::<BindingOptions>(r#"{ "ambiguity": "maybe" }"#).is_err());
    }
}
