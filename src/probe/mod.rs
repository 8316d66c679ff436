use crate::config::Labfile;
use crate::engine::ContainerEngine;
use crate::types::{HostState, ProbeResult, RunState};
use tracing::{debug, info};

/// Probe reachability for every ordered pair of declared hosts.
///
/// Pairs run sequentially in declaration order and results are returned in
/// that same stable order. A probe failure is data for the report, never an
/// error: one unreachable pair must not abort the run.
pub async fn run_probes(
    env: &Labfile,
    engine: &dyn ContainerEngine,
    states: &[HostState],
) -> Vec<ProbeResult> {
    let count = env.probe.count();
    let timeout = env.probe.timeout_secs();
    let mut results = Vec::new();

    info!("📡 Probing connectivity between {} hosts", env.hosts.len());

    for source in &env.hosts {
        for destination in &env.hosts {
            if source.name == destination.name {
                continue;
            }

            // A host that was never started fails with a reason, not a
            // timeout; no echo request is issued.
            if let Some(reason) = not_running_reason(states, source, destination) {
                results.push(ProbeResult {
                    source: source.name.clone(),
                    destination: destination.name.clone(),
                    success: false,
                    detail: reason,
                });
                continue;
            }

            let command = vec![
                "ping".to_string(),
                "-c".to_string(),
                count.to_string(),
                "-W".to_string(),
                timeout.to_string(),
                destination.address.to_string(),
            ];

            debug!("Probing {} -> {}", source.name, destination.name);

            let result = match engine.exec_capture(env, &source.name, &command).await {
                Ok(output) if output.success => ProbeResult {
                    source: source.name.clone(),
                    destination: destination.name.clone(),
                    success: true,
                    detail: summarize_ping(&output.stdout)
                        .unwrap_or_else(|| format!("{count}/{count} replies")),
                },
                Ok(output) => ProbeResult {
                    source: source.name.clone(),
                    destination: destination.name.clone(),
                    success: false,
                    detail: failure_reason(&output.stdout, &output.stderr),
                },
                Err(e) => ProbeResult {
                    source: source.name.clone(),
                    destination: destination.name.clone(),
                    success: false,
                    detail: e.to_string(),
                },
            };

            results.push(result);
        }
    }

    results
}

fn not_running_reason(
    states: &[HostState],
    source: &crate::config::Host,
    destination: &crate::config::Host,
) -> Option<String> {
    let state_of = |name: &str| {
        states
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.state.clone())
            .unwrap_or(RunState::NotCreated)
    };

    if !state_of(&source.name).is_running() {
        return Some(format!("source '{}' not running", source.name));
    }
    if !state_of(&destination.name).is_running() {
        return Some(format!("destination '{}' not running", destination.name));
    }
    None
}

/// Pull the round-trip summary line out of ping output. Handles both
/// iputils ("rtt min/avg/max/mdev = ...") and busybox ("round-trip
/// min/avg/max = ...") formats.
fn summarize_ping(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .rev()
        .find(|line| line.contains("min/avg/max"))
        .map(|line| line.trim().to_string())
}

fn failure_reason(stdout: &str, stderr: &str) -> String {
    let err = stderr.trim();
    if !err.is_empty() {
        return err.lines().last().unwrap_or(err).to_string();
    }
    stdout
        .trim()
        .lines()
        .last()
        .unwrap_or("no replies")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarizes_iputils_output() {
        let out = "PING 172.28.0.3 (172.28.0.3) 56(84) bytes of data.\n\
                   64 bytes from 172.28.0.3: icmp_seq=1 ttl=64 time=0.071 ms\n\
                   \n\
                   --- 172.28.0.3 ping statistics ---\n\
                   3 packets transmitted, 3 received, 0% packet loss, time 2037ms\n\
                   rtt min/avg/max/mdev = 0.055/0.067/0.071/0.008 ms";
        let summary = summarize_ping(out).unwrap();
        assert!(summary.starts_with("rtt min/avg/max"));
    }

    #[test]
    fn summarizes_busybox_output() {
        let out = "3 packets transmitted, 3 packets received, 0% packet loss\n\
                   round-trip min/avg/max = 0.102/0.131/0.155 ms";
        let summary = summarize_ping(out).unwrap();
        assert!(summary.starts_with("round-trip"));
    }

    #[test]
    fn no_summary_without_statistics() {
        assert!(summarize_ping("ping: sendto: Network unreachable").is_none());
    }

    #[test]
    fn failure_reason_prefers_stderr() {
        let reason = failure_reason("partial stdout", "ping: unknown host\n");
        assert_eq!(reason, "ping: unknown host");
    }
}
