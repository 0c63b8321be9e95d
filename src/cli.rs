//! `--flag=value` / `--flag value` parsing shared by the binaries.

use std::env;

fn process_args() -> Vec<String> {
    env::args().skip(1).collect()
}

pub fn arg_value(name: &str) -> Option<String> {
    value_in(&process_args(), name)
}

pub fn arg_values(name: &str) -> Vec<String> {
    values_in(&process_args(), name)
}

pub fn arg_f64(name: &str) -> Option<f64> {
    arg_value(name)?.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn has_flag(name: &str) -> bool {
    let bare = format!("--{name}");
    process_args().iter().any(|arg| *arg == bare)
}

/// First value given for `name`. A following `--other` flag is never taken
/// as the value.
pub fn value_in(args: &[String], name: &str) -> Option<String> {
    values_in(args, name).into_iter().next()
}

/// Every value given for a repeatable flag, in order.
pub fn values_in(args: &[String], name: &str) -> Vec<String> {
    let prefix = format!("--{name}=");
    let bare = format!("--{name}");
    let mut out = Vec::new();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                out.push(trimmed.to_string());
            }
        }
        if *arg == bare
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
            && !next.starts_with("--")
        {
            out.push(next.trim().to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn both_flag_forms_are_accepted() {
        let a = args(&["--a=Jannik Sinner", "--b", "Carlos Alcaraz"]);
        assert_eq!(value_in(&a, "a").as_deref(), Some("Jannik Sinner"));
        assert_eq!(value_in(&a, "b").as_deref(), Some("Carlos Alcaraz"));
        assert_eq!(value_in(&a, "tournament"), None);
    }

    #[test]
    fn missing_value_does_not_swallow_the_next_flag() {
        let a = args(&["--a", "--b", "Carlos Alcaraz"]);
        assert_eq!(value_in(&a, "a"), None);
        assert_eq!(value_in(&a, "b").as_deref(), Some("Carlos Alcaraz"));
    }

    #[test]
    fn negative_numbers_are_values() {
        let a = args(&["--fatigue-a", "-5"]);
        assert_eq!(value_in(&a, "fatigue-a").as_deref(), Some("-5"));
    }

    #[test]
    fn repeatable_flags_keep_order() {
        let a = args(&["--csv", "a.csv", "--db=x.sqlite", "--csv=b.csv"]);
        assert_eq!(values_in(&a, "csv"), vec!["a.csv", "b.csv"]);
    }
}
