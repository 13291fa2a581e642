use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

const SAMPLE: &str = "\
<think>planning</think>

Some **bold** text and math \\(x^2\\).

```python
print('hi')
```
";

#[test]
fn test_render_file_to_html() {
    let home = tempdir().unwrap();
    let file = home.path().join("reply.md");
    fs::write(&file, SAMPLE).unwrap();

    cargo_bin_cmd!("ochat")
        .env("OCHAT_HOME", home.path())
        .arg("render")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("<div class=\"content\">"))
        .stdout(predicate::str::contains("<strong>bold</strong>"))
        .stdout(predicate::str::contains("Think begin"))
        .stdout(predicate::str::contains("code-button-container"))
        .stdout(predicate::str::contains("Copy code"))
        .stdout(predicate::str::contains("Execute code").not());
}

#[test]
fn test_render_python_flag_offers_execute() {
    let home = tempdir().unwrap();

    cargo_bin_cmd!("ochat")
        .env("OCHAT_HOME", home.path())
        .args(["render", "-", "--python"])
        .write_stdin(SAMPLE)
        .assert()
        .success()
        .stdout(predicate::str::contains("Execute code"));
}

#[test]
fn test_render_escapes_raw_html() {
    let home = tempdir().unwrap();

    cargo_bin_cmd!("ochat")
        .env("OCHAT_HOME", home.path())
        .args(["render", "-"])
        .write_stdin("<script>alert(1)</script>\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("<script>").not())
        .stdout(predicate::str::contains("&lt;script&gt;"));
}

#[test]
fn test_render_missing_file_fails() {
    let home = tempdir().unwrap();

    cargo_bin_cmd!("ochat")
        .env("OCHAT_HOME", home.path())
        .args(["render", "does-not-exist.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist.md"));
}
