//! Name to interaction factory lookup and the interaction list syntax.
//!
//! Bindings name their interactions as `name(key=value,...)` entries
//! separated by `;`, for example `hold(duration=0.8);press`. Parameter
//! values are numbers; names and keys match case-insensitively.

use super::interaction::{Hold, Interaction, InteractionSettings, Press, SlowTap, Tap};
use crate::error::{IngressError, Result};
use std::collections::HashMap;
use std::fmt;

/// Parsed `key=value` parameters of one interaction entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionParams {
    values: Vec<(String, f64)>,
}

impl InteractionParams {
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| *v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(k, _)| k.as_str())
    }

    /// Fail on any key outside `allowed`.
    pub fn expect_only(&self, interaction: &str, allowed: &[&str]) -> Result<()> {
        for key in self.keys() {
            if !allowed.iter().any(|a| a.eq_ignore_ascii_case(key)) {
                return Err(IngressError::InvalidInteractionParameter(format!(
                    "{interaction}: unknown parameter '{key}'"
                )));
            }
        }
        Ok(())
    }
}

pub type InteractionFactory =
    dyn Fn(&InteractionParams, &InteractionSettings) -> Result<Interaction> + Send + Sync;

/// Interaction constructors by name.
pub struct InteractionRegistry {
    settings: InteractionSettings,
    factories: HashMap<String, Box<InteractionFactory>>,
}

impl InteractionRegistry {
    /// Registry holding the built-in interactions.
    pub fn new(settings: InteractionSettings) -> Self {
        let mut registry = Self {
            settings,
            factories: HashMap::new(),
        };
        registry.register("press", |params, settings| {
            params.expect_only("press", &["pressPoint"])?;
            Ok(Press::new(press_point(params, settings)).into())
        });
        registry.register("hold", |params, settings| {
            params.expect_only("hold", &["duration", "pressPoint"])?;
            let duration = duration(params, "hold", settings.hold_time)?;
            Ok(Hold::new(duration, press_point(params, settings)).into())
        });
        registry.register("tap", |params, settings| {
            params.expect_only("tap", &["duration", "pressPoint"])?;
            let duration = duration(params, "tap", settings.tap_time)?;
            Ok(Tap::new(duration, press_point(params, settings)).into())
        });
        registry.register("slowTap", |params, settings| {
            params.expect_only("slowTap", &["duration", "pressPoint"])?;
            let duration = duration(params, "slowTap", settings.slow_tap_time)?;
            Ok(SlowTap::new(duration, press_point(params, settings)).into())
        });
        registry
    }

    pub fn settings(&self) -> &InteractionSettings {
        &self.settings
    }

    /// Add or replace a factory.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&InteractionParams, &InteractionSettings) -> Result<Interaction>
            + Send
            + Sync
            + 'static,
    {
        self.factories
            .insert(name.to_ascii_lowercase(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }

    pub fn create(&self, name: &str, params: &InteractionParams) -> Result<Interaction> {
        let factory = self
            .factories
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| IngressError::UnknownInteraction(name.to_string()))?;
        factory(params, &self.settings)
    }

    /// Parse an interaction list such as `tap(duration=0.1);press`.
    pub fn parse(&self, text: &str) -> Result<Vec<Interaction>> {
        let mut interactions = Vec::new();
        for entry in text.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, params) = parse_entry(entry)?;
            interactions.push(self.create(name, &params)?);
        }
        Ok(interactions)
    }
}

impl Default for InteractionRegistry {
    fn default() -> Self {
        Self::new(InteractionSettings::default())
    }
}

impl fmt::Debug for InteractionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("InteractionRegistry")
            .field("settings", &self.settings)
            .field("interactions", &names)
            .finish()
    }
}

fn press_point(params: &InteractionParams, settings: &InteractionSettings) -> f32 {
    params
        .get("pressPoint")
        .map_or(settings.press_point, |p| p as f32)
}

fn duration(params: &InteractionParams, interaction: &str, default: f64) -> Result<f64> {
    match params.get("duration") {
        Some(d) if d < 0.0 || !d.is_finite() => Err(IngressError::InvalidInteractionParameter(
            format!("{interaction}: duration must be a non-negative number, got {d}"),
        )),
        Some(d) => Ok(d),
        None => Ok(default),
    }
}

fn parse_entry(entry: &str) -> Result<(&str, InteractionParams)> {
    let invalid =
        |reason: &str| IngressError::InvalidInteractionParameter(format!("{entry}: {reason}"));
    let Some(open) = entry.find('(') else {
        return Ok((entry, InteractionParams::default()));
    };
    let body = entry[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| invalid("missing closing parenthesis"))?;
    let name = entry[..open].trim();
    if name.is_empty() {
        return Err(invalid("missing interaction name"));
    }

    let mut params = InteractionParams::default();
    for pair in body.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| invalid("expected key=value"))?;
        let value: f64 = value
            .trim()
            .parse()
            .map_err(|_| invalid(&format!("'{}' is not a number", value.trim())))?;
        params.values.push((key.trim().to_string(), value));
    }
    Ok((name, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::interaction::{CustomInteraction, InteractionContext, PhaseRequest};

    #[test]
    fn test_parse_list_with_parameters() {
        let registry = InteractionRegistry::default();
        let interactions = registry.parse("hold(duration=0.8, pressPoint=0.3); press").unwrap();
        assert_eq!(interactions.len(), 2);
        assert_eq!(interactions[0].name(), "hold");
        assert_eq!(interactions[0].duration_seconds(), Some(0.8));
        assert_eq!(interactions[1].name(), "press");
    }

    #[test]
    fn test_defaults_come_from_settings() {
        let registry = InteractionRegistry::new(InteractionSettings {
            slow_tap_time: 1.25,
            ..Default::default()
        });
        let interactions = registry.parse("SLOWTAP").unwrap();
        assert_eq!(interactions[0].duration_seconds(), Some(1.25));
        let interactions = registry.parse("tap()").unwrap();
        assert_eq!(interactions[0].duration_seconds(), Some(0.2));
    }

    #[test]
    fn test_parse_errors() {
        let registry = InteractionRegistry::default();
        assert!(matches!(
            registry.parse("doubleTap"),
            Err(IngressError::UnknownInteraction(_))
        ));
        for bad in [
            "hold(duration=abc)",
            "hold(duration",
            "hold(speed=2)",
            "hold(duration=-1)",
            "(x=1)",
        ] {
            let err = registry.parse(bad).unwrap_err();
            assert!(
                matches!(err, IngressError::InvalidInteractionParameter(_)),
                "{bad}: {err}"
            );
        }
    }

    #[derive(Debug, Default)]
    struct Toggle {
        on: bool,
    }

    impl CustomInteraction for Toggle {
        fn name(&self) -> &str {
            "toggle"
        }

        fn process(&mut self, ctx: &InteractionContext) -> PhaseRequest {
            if ctx.is_pressed(0.5) {
                self.on = !self.on;
                if self.on {
                    return PhaseRequest::Started;
                }
                return PhaseRequest::Performed;
            }
            PhaseRequest::None
        }

        fn reset(&mut self) {
            self.on = false;
        }
    }

    #[test]
    fn test_register_custom() {
        let mut registry = InteractionRegistry::default();
        registry.register("toggle", |_, _| Ok(Interaction::Custom(Box::new(Toggle::default()))));
        let mut interactions = registry.parse("toggle").unwrap();
        assert_eq!(interactions[0].name(), "toggle");
        let ctx = InteractionContext::new(0, 1.0);
        assert_eq!(interactions[0].process(&ctx), PhaseRequest::Started);
        assert_eq!(interactions[0].process(&ctx), PhaseRequest::Performed);
    }
}
