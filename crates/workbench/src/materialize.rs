//! Turning procedure descriptions into clap commands
//!
//! Every argument is optional at the clap level. Required fields are
//! enforced when the assembled input reaches the router, so a missing
//! field reads the same from the CLI as from the socket. Flags the schema
//! does not declare are kept out of clap and handed to validation as well.

use clap::{Arg, ArgAction, Command};
use serde_json::Value;
use workbench_sdk::{CliParam, CliShape, CliUsageError, FieldKind, ProcedureDescription};

type FlagPair = (String, Option<String>);

/// Build the command for one procedure; `full_path` is `<module>.<path>`
pub fn procedure_command(full_path: &str, description: &ProcedureDescription) -> Command {
    let mut about = description.title.clone();
    if !description.description.is_empty() && description.description != description.title {
        about = format!("{} - {}", about, description.description);
    }

    let mut command = Command::new(full_path.to_string())
        .bin_name(format!("wb invoke {}", full_path))
        .about(about)
        .no_binary_name(true)
        .disable_version_flag(true);

    for param in &description.cli.positionals {
        command = command.arg(
            Arg::new(param.name.clone())
                .value_name(param.flag.to_uppercase())
                .help(param.help())
                .action(ArgAction::Set)
                .allow_negative_numbers(is_numeric(param.kind)),
        );
    }
    for param in &description.cli.options {
        command = command.arg(option_arg(param));
    }
    command
}

fn option_arg(param: &CliParam) -> Arg {
    let arg = Arg::new(param.name.clone())
        .long(param.flag.clone())
        .help(param.help());
    match param.kind {
        FieldKind::Boolean => arg
            .action(ArgAction::Set)
            .num_args(0..=1)
            .require_equals(true)
            .default_missing_value("true"),
        FieldKind::Array => arg.action(ArgAction::Append).value_name("VALUE"),
        kind => arg
            .action(ArgAction::Set)
            .value_name("VALUE")
            .allow_negative_numbers(is_numeric(kind)),
    }
}

fn is_numeric(kind: FieldKind) -> bool {
    matches!(kind, FieldKind::Integer | FieldKind::Number)
}

/// Separate `--flags` the shape does not declare from the tokens clap parses
///
/// An undeclared flag takes its value from `--flag=value` or from the next
/// token unless that token is itself a `--flag`. Everything after `--` is
/// left to clap.
fn split_undeclared(shape: &CliShape, args: &[String]) -> (Vec<String>, Vec<FlagPair>) {
    let mut declared = Vec::new();
    let mut undeclared = Vec::new();
    let mut tokens = args.iter().peekable();

    while let Some(arg) = tokens.next() {
        if arg == "--" {
            declared.push(arg.clone());
            declared.extend(tokens.by_ref().cloned());
            break;
        }
        let Some(body) = arg.strip_prefix("--") else {
            declared.push(arg.clone());
            continue;
        };
        let (flag, inline) = match body.split_once('=') {
            Some((flag, value)) => (flag, Some(value.to_string())),
            None => (body, None),
        };
        if flag == "help" || shape.options.iter().any(|p| p.flag == flag) {
            declared.push(arg.clone());
            continue;
        }
        let value = match inline {
            Some(value) => Some(value),
            None if tokens.peek().is_some_and(|next| !next.starts_with("--")) => {
                tokens.next().cloned()
            }
            None => None,
        };
        undeclared.push((flag.to_string(), value));
    }
    (declared, undeclared)
}

/// Why raw arguments could not become an input object
#[derive(Debug)]
pub enum ArgsError {
    /// clap rejected the arguments or `--help` was asked for
    Clap(clap::Error),
    Usage(CliUsageError),
}

/// Parse raw tokens following the procedure path into one input object
pub fn parse_input(
    full_path: &str,
    description: &ProcedureDescription,
    args: &[String],
) -> Result<Value, ArgsError> {
    let (args, undeclared) = split_undeclared(&description.cli, args);
    let matches = procedure_command(full_path, description)
        .try_get_matches_from(&args)
        .map_err(ArgsError::Clap)?;

    let positionals: Vec<String> = description
        .cli
        .positionals
        .iter()
        .map_while(|param| matches.get_one::<String>(&param.name).cloned())
        .collect();

    let mut options = Vec::new();
    for param in &description.cli.options {
        if let Some(values) = matches.get_many::<String>(&param.name) {
            for value in values {
                options.push((param.flag.clone(), Some(value.clone())));
            }
        }
    }
    options.extend(undeclared);

    description
        .cli
        .assemble(&positionals, &options)
        .map_err(ArgsError::Usage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use workbench_sdk::{FieldSpec, ProcedureContract, Router, Schema};

    fn describe() -> anyhow::Result<ProcedureDescription> {
        describe_with(
            "pr.list",
            Schema::object()
                .field(FieldSpec::string("repoName").required())
                .field(FieldSpec::integer("limit"))
                .field(FieldSpec::boolean("draft"))
                .field(FieldSpec::array("labels")),
        )
    }

    fn describe_with(path: &str, schema: Schema) -> anyhow::Result<ProcedureDescription> {
        let router: Router<()> = Router::builder("ci")
            .register(
                ProcedureContract::new(path, |input, _ctx: ()| async move { Ok(input) })
                    .input(schema),
            )?
            .build();
        router
            .describe()
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("no procedure described"))
    }

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_positional_and_flags_assemble_one_input() -> anyhow::Result<()> {
        let description = describe()?;
        let input = parse_input(
            "ci.pr.list",
            &description,
            &args(&["web", "--limit", "3", "--draft", "--labels", "bug", "--labels", "ui"]),
        )
        .map_err(|e| anyhow::anyhow!("{e:?}"))?;
        assert_eq!(
            input,
            json!({"repoName": "web", "limit": 3, "draft": true, "labels": ["bug", "ui"]})
        );
        Ok(())
    }

    #[test]
    fn test_missing_required_field_is_not_a_clap_error() -> anyhow::Result<()> {
        let description = describe()?;
        let input = parse_input("ci.pr.list", &description, &args(&["--draft=false"]))
            .map_err(|e| anyhow::anyhow!("{e:?}"))?;
        assert_eq!(input, json!({"draft": false}));
        Ok(())
    }

    #[test]
    fn test_uncoercible_value_is_kept_as_string() -> anyhow::Result<()> {
        let description = describe()?;
        let input = parse_input("ci.pr.list", &description, &args(&["web", "--limit", "many"]))
            .map_err(|e| anyhow::anyhow!("{e:?}"))?;
        assert_eq!(input["limit"], "many");
        Ok(())
    }

    #[test]
    fn test_help_is_rendered_from_the_schema() -> anyhow::Result<()> {
        let description = describe()?;
        let help = procedure_command("ci.pr.list", &description)
            .render_help()
            .to_string();
        assert!(help.contains("wb invoke ci.pr.list"));
        assert!(help.contains("[REPO-NAME]"));
        assert!(help.contains("--labels <VALUE>"));
        Ok(())
    }

    #[test]
    fn test_undeclared_flags_reach_the_input() -> anyhow::Result<()> {
        let description = describe()?;
        let input = parse_input(
            "ci.pr.list",
            &description,
            &args(&["web", "--colour", "red", "--loud", "--limit", "2", "--size=9"]),
        )
        .map_err(|e| anyhow::anyhow!("{e:?}"))?;
        assert_eq!(
            input,
            json!({"repoName": "web", "limit": 2, "colour": "red", "loud": true, "size": 9})
        );
        Ok(())
    }

    #[test]
    fn test_negative_numbers_are_values() -> anyhow::Result<()> {
        let description = describe_with(
            "pr.get",
            Schema::object()
                .field(FieldSpec::integer("number").required())
                .field(FieldSpec::number("offset")),
        )?;
        let input = parse_input("ci.pr.get", &description, &args(&["-5", "--offset", "-1.5"]))
            .map_err(|e| anyhow::anyhow!("{e:?}"))?;
        assert_eq!(input, json!({"number": -5, "offset": -1.5}));
        Ok(())
    }

    #[test]
    fn test_surplus_positional_is_rejected() -> anyhow::Result<()> {
        let description = describe()?;
        assert!(matches!(
            parse_input("ci.pr.list", &description, &args(&["a", "b"])),
            Err(ArgsError::Clap(_))
        ));
        Ok(())
    }
}
