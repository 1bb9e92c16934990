use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;

#[test]
fn trusted_path() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("pvctool")?;
    cmd.arg("-s").arg("tests/examples/trusted.json");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Trust result: Unspecified"))
        .stdout(predicate::str::contains("Anchored: true"))
        .stdout(predicate::str::contains("Failed:").not());
    Ok(())
}

#[test]
fn time_of_interest_overrides_scenario() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("pvctool")?;
    cmd.arg("-s").arg("tests/examples/trusted.json");
    cmd.arg("-i").arg("1735689600");
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("Trust result: RecoverableTrustFailure"))
        .stdout(predicate::str::contains("Failed: ValidLeaf (false)"));
    Ok(())
}

#[test]
fn untrusted_anchor() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("pvctool")?;
    cmd.arg("-s").arg("tests/examples/untrusted.json");
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("Anchored: false"))
        .stdout(predicate::str::contains("Failed: AnchorTrusted (false)"));
    Ok(())
}

#[test]
fn exception_proceeds() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("pvctool")?;
    cmd.arg("-s").arg("tests/examples/excepted.json");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Trust result: Proceed"));
    Ok(())
}

#[test]
fn unknown_check() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("pvctool")?;
    cmd.arg("-s").arg("tests/examples/unknown_check.json");
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("Trust result: OtherError"));
    Ok(())
}

#[test]
fn json_report() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("pvctool")?;
    cmd.arg("-s").arg("tests/examples/trusted.json").arg("--json");
    let output = cmd.output()?;
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!("Unspecified", report["result"]);
    assert_eq!(1700000000, report["verify_time"]);
    assert_eq!("sslServer", report["policies"][0]);
    assert_eq!(3, report["certificates"].as_array().map(|a| a.len()).unwrap_or(0));
    assert_eq!(false, report["extended_validation"]);
    assert!(report["certificates"][0]["subject"]
        .as_str()
        .unwrap_or_default()
        .contains("www.example.com"));
    Ok(())
}

#[test]
fn settings_block_intermediate() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let settings = dir.path().join("settings.json");
    fs::write(
        &settings,
        r#"{"blocked_keys": ["B969BF67794F36895D79B9ACADD42F50DC841F0E"]}"#,
    )?;

    let mut cmd = Command::cargo_bin("pvctool")?;
    cmd.arg("-s").arg("tests/examples/trusted.json");
    cmd.arg("--settings").arg(&settings);
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("Trust result: FatalTrustFailure"))
        .stdout(predicate::str::contains("Failed: BlackListedKey (false)"));
    Ok(())
}

#[test]
fn embedded_certificates() -> Result<(), Box<dyn std::error::Error>> {
    use base64ct::{Base64, Encoding};

    let dir = tempfile::tempdir()?;
    let encoded: Vec<String> = ["leaf.der", "issuing_ca.der", "root.der"]
        .iter()
        .map(|f| fs::read(format!("tests/examples/{f}")).map(|der| Base64::encode_string(&der)))
        .collect::<Result<_, _>>()?;
    let scenario = serde_json::json!({
        "certificates": [{"der": encoded[0]}, {"der": encoded[1]}, {"der": encoded[2]}],
        "policies": [{"preset": "sslServer", "value": "mail.example.com"}],
        "verify_time": 1700000000,
        "anchors": [{"certificate": 2}]
    });
    let fname = dir.path().join("scenario.json");
    fs::write(&fname, scenario.to_string())?;

    let mut cmd = Command::cargo_bin("pvctool")?;
    cmd.arg("-s").arg(&fname);
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("Failed: SSLHostname (false)"));
    Ok(())
}

#[test]
fn bad_inputs() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("pvctool")?;
    cmd.arg("-s").arg("tests/examples/does_not_exist.json");
    cmd.assert().code(2);

    let dir = tempfile::tempdir()?;
    let fname = dir.path().join("scenario.json");
    fs::write(&fname, r#"{"certificates": ["missing.der"], "policies": []}"#)?;
    let mut cmd = Command::cargo_bin("pvctool")?;
    cmd.arg("-s").arg(&fname);
    cmd.assert().code(2).stderr(predicate::str::contains("ERROR"));
    Ok(())
}

#[test]
fn list_checks() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("pvctool")?;
    cmd.arg("--list-checks");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("SSLHostname"))
        .stdout(predicate::str::contains("CTRequired"));
    Ok(())
}

#[test]
fn logging_config() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let log_file = dir.path().join("pvctool.log");
    let config = dir.path().join("log.yaml");
    fs::write(
        &config,
        format!(
            "appenders:\n  file:\n    kind: file\n    path: \"{}\"\n    encoder:\n      pattern: \"{{m}}{{n}}\"\nroot:\n  level: debug\n  appenders:\n    - file\n",
            log_file.display()
        ),
    )?;

    let mut cmd = Command::cargo_bin("pvctool")?;
    cmd.arg("-s").arg("tests/examples/trusted.json");
    cmd.arg("-l").arg(&config);
    cmd.assert().success();

    let logged = fs::read_to_string(&log_file)?;
    assert!(logged.contains("Evaluating 3 certificates against 1 policies at 1700000000"));
    Ok(())
}
