use std::path::PathBuf;
use std::process::Command;

use turtle_lab::{CanvasSize, Surface, bake};

fn exe() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_turtle-lab"))
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("cli_smoke").join(name);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn cli_extract_prints_embedded_source() {
    let dir = scratch_dir("extract");
    let png = dir.join("baked.png");
    let source = "fd(50)\nlt(90) // 50% & more";
    bake(&Surface::new(CanvasSize::square(8)), source)
        .unwrap()
        .save_as(&png)
        .unwrap();

    let out = Command::new(exe())
        .args(["extract", "--in"])
        .arg(&png)
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert_eq!(String::from_utf8(out.stdout).unwrap(), source);
}

#[test]
fn cli_extract_fails_without_embedded_source() {
    let dir = scratch_dir("extract_missing");
    let png = dir.join("plain.png");
    let bytes = turtle_lab::encode_png(&[0; 4], CanvasSize::square(1), &[]).unwrap();
    std::fs::write(&png, bytes).unwrap();

    let out = Command::new(exe())
        .args(["extract", "--in"])
        .arg(&png)
        .output()
        .unwrap();
    assert!(!out.status.success());
}

#[cfg(unix)]
#[test]
fn cli_render_then_rerender_from_png() {
    let dir = scratch_dir("render");
    let src = dir.join("square.turtle");
    let first = dir.join("first.png");
    let second = dir.join("second.png");
    let _ = std::fs::remove_file(&first);
    let _ = std::fs::remove_file(&second);
    std::fs::write(&src, "repeat 4 [fd 20 rt 90]").unwrap();

    let sandbox_script = r#"read req
for i in 1 2 3 4; do
  echo '{"msg":"turtle-methodcall","method":"fd","args":[20]}'
  echo '{"msg":"turtle-methodcall","method":"rt","args":[90]}'
done
echo '{"msg":"done"}'"#;

    let status = Command::new(exe())
        .args(["render", "--source"])
        .arg(&src)
        .arg("--out")
        .arg(&first)
        .args(["--sandbox", "sh", "--sandbox-arg", "-c", "--sandbox-arg"])
        .arg(sandbox_script)
        .status()
        .unwrap();
    assert!(status.success());
    let baked = std::fs::read(&first).unwrap();
    assert_eq!(
        turtle_lab::extract_source(&baked).as_deref(),
        Some("repeat 4 [fd 20 rt 90]")
    );

    let status = Command::new(exe())
        .args(["render", "--from-png"])
        .arg(&first)
        .arg("--out")
        .arg(&second)
        .args(["--sandbox", "sh", "--sandbox-arg", "-c", "--sandbox-arg"])
        .arg(sandbox_script)
        .status()
        .unwrap();
    assert!(status.success());
    assert_eq!(std::fs::read(&second).unwrap(), baked);
}

#[cfg(unix)]
#[test]
fn cli_from_png_keeps_imported_source_verbatim() {
    let dir = scratch_dir("from_png_verbatim");
    let input = dir.join("padded.png");
    let output = dir.join("rebaked.png");
    let _ = std::fs::remove_file(&output);
    let source = "\n  fd(1)  \n";
    bake(&Surface::new(CanvasSize::square(8)), source)
        .unwrap()
        .save_as(&input)
        .unwrap();

    let status = Command::new(exe())
        .args(["render", "--from-png"])
        .arg(&input)
        .arg("--out")
        .arg(&output)
        .args(["--sandbox", "sh", "--sandbox-arg", "-c", "--sandbox-arg"])
        .arg(r#"read req; echo '{"msg":"done"}'"#)
        .status()
        .unwrap();
    assert!(status.success());
    let rebaked = std::fs::read(&output).unwrap();
    assert_eq!(
        turtle_lab::extract_source(&rebaked).as_deref(),
        Some(source)
    );
}
