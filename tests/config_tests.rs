use netlab::LabfileBuilder;
use netlab::config::{Host, Labfile, create_example_labfile};
use netlab::error::ConfigError;
use pretty_assertions::assert_eq;
use std::net::Ipv4Addr;
use tempfile::TempDir;

#[test]
fn example_scenario_validates() {
    // Two hosts on a /24, both inside the block
    let labfile = LabfileBuilder::new("scenario", "10.0.0.0/24")
        .add_host(Host::with_image(
            "a",
            Ipv4Addr::new(10, 0, 0, 2),
            "debian:bookworm",
        ))
        .add_host(Host::with_image(
            "b",
            Ipv4Addr::new(10, 0, 0, 3),
            "debian:bookworm",
        ))
        .build();

    assert!(labfile.validate().is_ok());
}

#[test]
fn address_outside_cidr_is_rejected() {
    let labfile = LabfileBuilder::new("bad", "10.0.0.0/24")
        .add_host(Host::with_image(
            "a",
            Ipv4Addr::new(10, 0, 1, 2),
            "debian:bookworm",
        ))
        .build();

    let err = labfile.validate().unwrap_err();
    assert!(matches!(err, ConfigError::AddressOutsideNetwork { .. }));
}

#[test]
fn duplicate_host_names_are_rejected() {
    let labfile = LabfileBuilder::new("bad", "10.0.0.0/24")
        .add_host(Host::with_image(
            "a",
            Ipv4Addr::new(10, 0, 0, 2),
            "debian:bookworm",
        ))
        .add_host(Host::with_image(
            "a",
            Ipv4Addr::new(10, 0, 0, 3),
            "debian:bookworm",
        ))
        .build();

    assert!(matches!(
        labfile.validate().unwrap_err(),
        ConfigError::DuplicateHost { .. }
    ));
}

#[test]
fn duplicate_addresses_are_rejected() {
    let labfile = LabfileBuilder::new("bad", "10.0.0.0/24")
        .add_host(Host::with_image(
            "a",
            Ipv4Addr::new(10, 0, 0, 2),
            "debian:bookworm",
        ))
        .add_host(Host::with_image(
            "b",
            Ipv4Addr::new(10, 0, 0, 2),
            "debian:bookworm",
        ))
        .build();

    assert!(matches!(
        labfile.validate().unwrap_err(),
        ConfigError::DuplicateAddress { .. }
    ));
}

#[test]
fn empty_host_list_is_rejected() {
    let labfile = LabfileBuilder::new("bad", "10.0.0.0/24").build();
    assert!(matches!(
        labfile.validate().unwrap_err(),
        ConfigError::MissingField { .. }
    ));
}

#[test]
fn image_and_build_are_mutually_exclusive() {
    let mut host = Host::with_image("a", Ipv4Addr::new(10, 0, 0, 2), "debian:bookworm");
    host.build = Some("./a".to_string());

    let labfile = LabfileBuilder::new("bad", "10.0.0.0/24")
        .add_host(host)
        .build();

    assert!(matches!(
        labfile.validate().unwrap_err(),
        ConfigError::InvalidFormat { .. }
    ));
}

#[test]
fn host_needs_image_or_build() {
    let mut host = Host::with_image("a", Ipv4Addr::new(10, 0, 0, 2), "debian:bookworm");
    host.image = None;

    let labfile = LabfileBuilder::new("bad", "10.0.0.0/24")
        .add_host(host)
        .build();

    assert!(matches!(
        labfile.validate().unwrap_err(),
        ConfigError::InvalidFormat { .. }
    ));
}

#[test]
fn malformed_cidr_is_rejected() {
    let labfile = LabfileBuilder::new("bad", "not-a-cidr")
        .add_host(Host::with_image(
            "a",
            Ipv4Addr::new(10, 0, 0, 2),
            "debian:bookworm",
        ))
        .build();

    assert!(matches!(
        labfile.validate().unwrap_err(),
        ConfigError::InvalidCidr { .. }
    ));
}

#[test]
fn mounts_may_only_reference_declared_hosts() {
    let mut labfile = create_example_labfile();
    labfile.mounts[0].hosts = Some(vec!["ghost".to_string()]);

    assert!(matches!(
        labfile.validate().unwrap_err(),
        ConfigError::UnknownHost { .. }
    ));
}

#[test]
fn save_then_load_preserves_declaration_order() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("Labfile.toml");

    let labfile = create_example_labfile();
    labfile.save(&path).unwrap();

    let loaded = Labfile::load(&path).unwrap();
    let names: Vec<&str> = loaded.hosts.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(names, vec!["attacker", "target"]);
    assert_eq!(loaded.project, labfile.project);
    assert_eq!(loaded.network.cidr, "172.28.0.0/16");
}

#[test]
fn loads_handwritten_descriptor() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("Labfile.toml");

    std::fs::write(
        &path,
        r#"
project = "trainlab"

[network]
name = "labnet"
cidr = "10.0.0.0/24"

[[hosts]]
name = "alpha"
address = "10.0.0.2"
image = "debian:bookworm"

[[hosts]]
name = "beta"
address = "10.0.0.3"
build = "./beta"
cap_add = ["NET_ADMIN"]

[[mounts]]
source = "./shared"
target = "/shared"

[startup]
settle_secs = 0

[probe]
count = 5
"#,
    )
    .unwrap();

    let labfile = Labfile::load(&path).unwrap();
    assert_eq!(labfile.project, "trainlab");
    assert_eq!(labfile.hosts.len(), 2);
    assert!(labfile.host("beta").unwrap().build.is_some());
    assert_eq!(labfile.probe.count(), 5);
    assert_eq!(labfile.startup.settle_secs(), 0);
    // Unset fields fall back to defaults
    assert_eq!(labfile.probe.timeout_secs(), 2);
}

#[test]
fn missing_labfile_reports_path() {
    let err = Labfile::load("/nonexistent/Labfile.toml").unwrap_err();
    assert!(matches!(err, ConfigError::LabfileNotFound { .. }));
    assert!(err.to_string().contains("/nonexistent/Labfile.toml"));
}

#[test]
fn garbage_toml_is_an_invalid_format_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("Labfile.toml");
    std::fs::write(&path, "project = [not toml").unwrap();

    assert!(matches!(
        Labfile::load(&path).unwrap_err(),
        ConfigError::InvalidFormat { .. }
    ));
}
