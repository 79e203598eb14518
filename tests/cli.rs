use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_autogroup-cli"))
}

#[test]
fn groups_a_text_file_and_writes_csv() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("class.txt");
    let csv = dir.path().join("out.csv");
    fs::write(&input, "A\nB\nC\nD\nE").unwrap();

    let output = cli()
        .arg(&input)
        .args(["--size", "2", "--csv"])
        .arg(&csv)
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("Group 1 (2 members):\n  \u{2022} A\n  \u{2022} B\n"));
    assert!(stdout.contains("Group 3 (1 members):\n  \u{2022} E\n"));
    assert_eq!(
        fs::read_to_string(&csv).unwrap(),
        "Group 1,Group 2,Group 3\nA,C,E\nB,D,\n"
    );
}

#[test]
fn writes_pdf_and_xlsx_outputs() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("class.csv");
    let pdf = dir.path().join("groups.pdf");
    let xlsx = dir.path().join("groups.xlsx");
    fs::write(&input, "Ann,Ben,Cal").unwrap();

    let status = cli()
        .arg(&input)
        .args(["--size", "2", "--shuffle", "--pdf"])
        .arg(&pdf)
        .arg("--xlsx")
        .arg(&xlsx)
        .status()
        .unwrap();

    assert!(status.success());
    assert!(fs::read(&pdf).unwrap().starts_with(b"%PDF"));
    assert!(fs::read(&xlsx).unwrap().starts_with(b"PK"));
}

#[test]
fn unsupported_file_fails_with_message() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("slides.pdf");
    fs::write(&input, "%PDF-1.4").unwrap();

    let output = cli().arg(&input).args(["--size", "2"]).output().unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Unsupported file format. Please use .txt, .csv, .xlsx, or .xls"));
}

#[test]
fn bad_group_size_fails_with_message() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("class.txt");
    fs::write(&input, "A,B").unwrap();

    let output = cli().arg(&input).args(["--size", "zero"]).output().unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Group size must be a positive integer"));
}
