//! Text rendering for procedure and provider listings

use owo_colors::OwoColorize;
use workbench_daemon::providers::{DiscoveryReport, ProviderInfo};
use workbench_daemon::Dispatcher;
use workbench_sdk::{CliParam, ProcedureDescription};

/// Usage line for one procedure, e.g. `wb invoke ci.pr.get <NUMBER> [--x <VALUE>]`
pub fn usage(full_path: &str, description: &ProcedureDescription) -> String {
    let mut line = format!("wb invoke {}", full_path);
    for param in &description.cli.positionals {
        line.push_str(&format!(" <{}>", param.flag.to_uppercase()));
    }
    for param in &description.cli.options {
        line.push(' ');
        line.push_str(&option_usage(param));
    }
    line
}

fn option_usage(param: &CliParam) -> String {
    let flag = match param.kind {
        workbench_sdk::FieldKind::Boolean => format!("--{}", param.flag),
        _ => format!("--{} <VALUE>", param.flag),
    };
    if param.required {
        flag
    } else {
        format!("[{}]", flag)
    }
}

/// Every procedure grouped by module, in registration order
pub fn render_procedures(dispatcher: &Dispatcher) -> String {
    let mut out = String::new();
    for router in dispatcher.modules() {
        let header = match router.provider_type() {
            Some(provider_type) => format!("{} (provider: {})", router.name(), provider_type),
            None => router.name().to_string(),
        };
        out.push_str(&format!("{}\n", header.bold()));
        for description in router.describe() {
            let full_path = format!("{}.{}", router.name(), description.path);
            out.push_str(&format!("  {}\n", usage(&full_path, &description)));
            out.push_str(&format!("      {}\n", description.title));
        }
        out.push('\n');
    }
    out
}

pub fn render_providers(providers: &[ProviderInfo], report: &DiscoveryReport) -> String {
    let mut out = String::new();
    if providers.is_empty() {
        out.push_str("No providers registered\n");
    }
    for info in providers {
        out.push_str(&format!(
            "{} {} ({})\n",
            info.provider_type.bold(),
            info.name,
            info.source
        ));
        out.push_str(&format!("  supports: {}\n", info.supported.join(", ")));
        if !info.missing_tokens.is_empty() {
            out.push_str(&format!(
                "  missing tokens: {}\n",
                info.missing_tokens.join(", ")
            ));
        }
    }
    for failure in &report.failures {
        out.push_str(&format!(
            "{} {}: {}\n",
            "skipped".yellow(),
            failure.source,
            failure.error
        ));
    }
    out
}
