//! Terminal rendering of bus signals.

use std::fmt::Write as _;
use std::io::{self, IsTerminal};

use owo_colors::OwoColorize;

use heatlink_core::Signal;

use crate::cli::ColorMode;

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Render one signal. Parameter updates render only when `parameters`
/// is set; `None` means nothing to print.
pub fn render_signal(signal: &Signal, color: bool, parameters: bool) -> Option<String> {
    let system = format!("[system {}]", signal.system_id());
    let system = if color {
        system.cyan().to_string()
    } else {
        system
    };

    match signal {
        Signal::StatusesUpdated { statuses, .. } => {
            let list = if statuses.is_empty() {
                "idle".to_owned()
            } else {
                statuses.iter().cloned().collect::<Vec<_>>().join(", ")
            };
            Some(format!("{system} {list}"))
        }
        Signal::ParametersUpdated {
            parameters: values, ..
        } if parameters => {
            let mut ids: Vec<_> = values.keys().copied().collect();
            ids.sort_unstable();
            let mut out = format!("{system} {} parameters", ids.len());
            for id in ids {
                let p = &values[&id];
                let _ = write!(out, "\n  {id:>6}  {}: {}", p.title, p.display_value);
            }
            Some(out)
        }
        Signal::ParametersUpdated { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Arc;

    use heatlink_core::Parameter;
    use pretty_assertions::assert_eq;

    fn parameter(id: u32, title: &str, display: &str) -> Parameter {
        Parameter {
            parameter_id: id,
            name: String::new(),
            title: title.into(),
            designation: String::new(),
            unit: String::new(),
            display_value: display.into(),
            raw_value: 0,
        }
    }

    #[test]
    fn statuses_render_as_a_list() {
        let signal = Signal::StatusesUpdated {
            system_id: 7,
            statuses: Arc::new(BTreeSet::from(["Compressor".into(), "Hot water".into()])),
        };
        assert_eq!(
            render_signal(&signal, false, false).as_deref(),
            Some("[system 7] Compressor, Hot water")
        );
    }

    #[test]
    fn empty_statuses_render_as_idle() {
        let signal = Signal::StatusesUpdated {
            system_id: 7,
            statuses: Arc::new(BTreeSet::new()),
        };
        assert_eq!(
            render_signal(&signal, false, false).as_deref(),
            Some("[system 7] idle")
        );
    }

    #[test]
    fn parameters_render_only_on_request() {
        let signal = Signal::ParametersUpdated {
            system_id: 7,
            parameters: Arc::new(HashMap::from([
                (40013, parameter(40013, "hot water top", "48.2°C")),
                (40004, parameter(40004, "outdoor temp.", "3.1°C")),
            ])),
        };
        assert_eq!(render_signal(&signal, false, false), None);
        assert_eq!(
            render_signal(&signal, false, true).as_deref(),
            Some(
                "[system 7] 2 parameters\n   40004  outdoor temp.: 3.1°C\n   40013  hot water top: 48.2°C"
            )
        );
    }
}
