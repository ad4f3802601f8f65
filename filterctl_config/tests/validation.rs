use filterctl_config::{load_toml, Config};

#[test]
fn empty_config_is_valid() {
    let cfg = load_toml("").expect("parse");
    cfg.validate().expect("valid");
    assert!(cfg.control.mode.is_none());
    assert!(cfg.positions.in_counts.is_none());
}

#[test]
fn full_config_parses() {
    let cfg = load_toml(
        r#"
[control]
mode = 1
timeout = 2.5

[positions]
in = [100, 300, 500, 700]
out = [0, 200, 400, 600]

[thresholds]
low1 = 50
low2 = 10
high1 = 1000
high2 = 5000
high3 = 50000

[logging]
file = "filterctl.log"
level = "debug"
rotation = "daily"
"#,
    )
    .expect("parse");
    cfg.validate().expect("valid");

    assert_eq!(cfg.control.mode, Some(1));
    assert_eq!(cfg.control.timeout, Some(2.5));
    assert_eq!(cfg.positions.in_counts, Some([100, 300, 500, 700]));
    assert_eq!(cfg.thresholds.high3, Some(50000));
    assert_eq!(cfg.logging.rotation.as_deref(), Some("daily"));
}

#[test]
fn rejects_bad_mode() {
    let cfg = load_toml("[control]\nmode = 7\n").expect("parse");
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_negative_timeout() {
    let cfg = load_toml("[control]\ntimeout = -1.0\n").expect("parse");
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_unknown_rotation() {
    let cfg = load_toml("[logging]\nrotation = \"weekly\"\n").expect("parse");
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_wrong_position_arity() {
    assert!(load_toml("[positions]\nin = [1, 2, 3]\n").is_err());
}

#[test]
fn default_is_empty() {
    let cfg = Config::default();
    cfg.validate().expect("valid");
}
