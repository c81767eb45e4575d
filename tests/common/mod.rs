#![allow(dead_code)]

use assert_cmd::Command;
use image::{ImageFormat, Rgba, RgbaImage};
use std::fs;
use std::io::Cursor;
use std::path::PathBuf;
use tempfile::TempDir;

/// A scratch project with local logos, so no test touches the network.
pub struct Project {
    _tmp: TempDir,
    pub root: PathBuf,
}

impl Project {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let root = tmp.path().to_path_buf();
        fs::create_dir_all(root.join("data")).expect("create data dir");
        fs::create_dir_all(root.join("public/sponsors")).expect("create public dir");
        Self { _tmp: tmp, root }
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("badgesheet").expect("binary built");
        cmd.arg("-C").arg(&self.root).env_remove("RUST_LOG");
        cmd
    }

    pub fn write(&self, rel: &str, contents: impl AsRef<[u8]>) {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, contents).expect("write fixture");
    }

    pub fn logo(&self, rel: &str, width: u32, height: u32) {
        self.write(&format!("public/{rel}"), png(width, height));
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.root.join(rel)).expect("read output")
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.root.join(rel).exists()
    }
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        if (x + y) % 2 == 0 {
            Rgba([30, 90, 200, 255])
        } else {
            Rgba([250, 250, 250, 255])
        }
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).expect("encode png");
    out.into_inner()
}
