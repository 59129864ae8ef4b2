use std::path::{Path, PathBuf};

use lyricode::{CardModel, GradientId};

fn exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_lyricode")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "lyricode.exe"
            } else {
                "lyricode"
            });
            p
        })
}

fn run(data_dir: &Path, args: &[&str]) -> std::process::Output {
    std::process::Command::new(exe())
        .arg("--data-dir")
        .arg(data_dir)
        .args(args)
        .output()
        .unwrap()
}

fn fresh_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("cli_smoke").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_card(dir: &Path, card: &CardModel) -> String {
    let path = dir.join("card.json");
    let f = std::fs::File::create(&path).unwrap();
    serde_json::to_writer_pretty(f, card).unwrap();
    path.to_string_lossy().to_string()
}

#[test]
fn cli_render_writes_named_png() {
    let dir = fresh_dir("render");
    let mut card = CardModel::lyric();
    card.set_title("Home");
    card.set_lyrics("la la la");
    let card_arg = write_card(&dir, &card);
    let out_dir = dir.join("out");
    let out_arg = out_dir.to_string_lossy().to_string();

    let out = run(
        &dir.join("data"),
        &["render", "--card", &card_arg, "--gradient", "mesh3", "--out-dir", &out_arg],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let png = std::fs::read(out_dir.join("Home-lyrics.png")).unwrap();
    let img = image::load_from_memory(&png).unwrap();
    assert_eq!((img.width(), img.height()), (1200, 1200));
}

#[test]
fn cli_render_refuses_empty_lyric_card() {
    let dir = fresh_dir("render_empty");
    let card_arg = write_card(&dir, &CardModel::lyric());
    let out = run(&dir.join("data"), &["render", "--card", &card_arg]);
    assert!(!out.status.success());
}

#[test]
fn cli_publish_feed_like() {
    let dir = fresh_dir("publish");
    let data = dir.join("data");
    let mut card = CardModel::code();
    card.set_code("fn main() {}");
    card.set_language("rust");
    card.set_gradient(GradientId::Mesh4);
    let card_arg = write_card(&dir, &card);

    let out = run(&data, &["publish", "--card", &card_arg, "--creator", "sam"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let id = String::from_utf8(out.stdout).unwrap().trim().to_owned();
    assert!(!id.is_empty());

    let out = run(&data, &["like", &id]);
    assert!(out.status.success());
    assert_eq!(String::from_utf8(out.stdout).unwrap().trim(), "1");

    let out = run(&data, &["feed"]);
    assert!(out.status.success());
    let feed = String::from_utf8(out.stdout).unwrap();
    let line = feed.lines().find(|l| l.starts_with(&id)).unwrap();
    assert!(line.contains("<rust>"));
    assert!(line.contains("1 likes"));
    assert!(line.contains("by sam"));

    let out = run(&data, &["like", "missing-id"]);
    assert!(!out.status.success());
}
