use crate::config::{LabConfig, Labfile};
use crate::error::Result;
use crate::types::{HostState, ProbeResult};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// Render the environment summary: host table, probe results, usage block.
/// Pure formatting over an injected sink; callers treat write failures as
/// best-effort.
pub fn render<W: Write>(
    out: &mut W,
    env: &Labfile,
    states: &[HostState],
    probes: &[ProbeResult],
) -> std::io::Result<()> {
    writeln!(out, "Project: {}", env.project)?;
    writeln!(out, "Network: {} ({})", env.network_name(), env.network.cidr)?;
    writeln!(out)?;

    writeln!(out, "{:<15} {:<17} {:<12} {}", "HOST", "ADDRESS", "STATE", "STATUS")?;
    writeln!(out, "{}", "─".repeat(64))?;
    for host in &env.hosts {
        let state = states.iter().find(|s| s.name == host.name);
        let (state_text, detail) = match state {
            Some(s) => (s.state.to_string(), s.detail.clone()),
            None => ("unknown".to_string(), "-".to_string()),
        };
        writeln!(
            out,
            "{:<15} {:<17} {:<12} {}",
            host.name, host.address, state_text, detail
        )?;
    }

    if !probes.is_empty() {
        writeln!(out)?;
        writeln!(out, "{:<15} {:<15} {:<8} {}", "SOURCE", "DESTINATION", "RESULT", "DETAIL")?;
        writeln!(out, "{}", "─".repeat(64))?;
        for probe in probes {
            writeln!(
                out,
                "{:<15} {:<15} {:<8} {}",
                probe.source,
                probe.destination,
                if probe.success { "ok" } else { "FAIL" },
                probe.detail
            )?;
        }
    }

    writeln!(out)?;
    out.write_all(usage_reference(env).as_bytes())?;
    Ok(())
}

/// Static usage-reference block, also embedded in the generated README
pub fn usage_reference(env: &Labfile) -> String {
    let first_host = env
        .hosts
        .first()
        .map(|h| h.name.as_str())
        .unwrap_or("HOST");

    let mut text = String::new();
    text.push_str("Usage examples:\n");
    text.push_str("  netlab start            # build and start the lab\n");
    text.push_str("  netlab status           # show host states\n");
    text.push_str("  netlab test             # probe connectivity between hosts\n");
    text.push_str(&format!(
        "  netlab connect {:<9}# open a shell inside a host\n",
        first_host
    ));
    text.push_str("  netlab logs --tail 50   # follow engine logs\n");
    text.push_str("  netlab stop             # stop the lab, keep volumes\n");
    text.push_str("  netlab cleanup          # remove containers, volumes and images\n");
    text
}

/// Write the reference document into every shared mount. Regenerated on each
/// start: overwritten, never appended.
pub fn write_reference(env: &Labfile, config: &LabConfig) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    for mount in &env.mounts {
        let dir = config.resolve_host_path(&mount.source);
        let path = dir.join("README.md");

        let mut content = String::new();
        content.push_str(&format!("# {} lab environment\n\n", env.project));
        content.push_str(&format!(
            "Generated by netlab on {}.\n\n",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        ));
        content.push_str(&format!(
            "This directory is shared with all lab hosts at `{}`.\n\n",
            mount.target
        ));
        content.push_str("Declared hosts:\n\n");
        for host in &env.hosts {
            content.push_str(&format!("- `{}` at {}\n", host.name, host.address));
        }
        content.push_str("\n```\n");
        content.push_str(&usage_reference(env));
        content.push_str("```\n");

        std::fs::write(&path, content)?;
        info!("📝 Reference written to {:?}", path);
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::create_example_labfile;
    use crate::types::{ProbeResult, RunState};

    #[test]
    fn report_lists_every_host_once_in_declaration_order() {
        let env = create_example_labfile();
        let states = vec![
            HostState {
                name: "attacker".to_string(),
                state: RunState::Running,
                detail: "Up 2 minutes".to_string(),
            },
            HostState {
                name: "target".to_string(),
                state: RunState::NotCreated,
                detail: "not created".to_string(),
            },
        ];

        let mut out = Vec::new();
        render(&mut out, &env, &states, &[]).unwrap();
        let text = String::from_utf8(out).unwrap();

        let attacker = text.find("attacker").unwrap();
        let target = text.find("target").unwrap();
        assert!(attacker < target);
        assert_eq!(text.matches("172.28.0.2").count(), 1);
        assert!(text.contains("not created"));
        assert!(text.contains("Usage examples"));
    }

    #[test]
    fn probe_section_rendered_when_present() {
        let env = create_example_labfile();
        let probes = vec![ProbeResult {
            source: "attacker".to_string(),
            destination: "target".to_string(),
            success: false,
            detail: "destination 'target' not running".to_string(),
        }];

        let mut out = Vec::new();
        render(&mut out, &env, &[], &probes).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("FAIL"));
        assert!(text.contains("destination 'target' not running"));
    }

    #[test]
    fn usage_reference_names_a_declared_host() {
        let env = create_example_labfile();
        assert!(usage_reference(&env).contains("netlab connect attacker"));
    }
}
