//! サービス単位のコンソール出力
//!
//! 進捗は `[<service>] <message>` 形式で stdout に出します。

use colored::Colorize;
use std::fmt::Display;

const SEPARATOR_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy)]
pub struct ServiceLog<'a> {
    name: &'a str,
}

impl<'a> ServiceLog<'a> {
    pub fn new(name: &'a str) -> Self {
        Self { name }
    }

    fn prefix(&self) -> String {
        format!("[{}]", self.name).cyan().to_string()
    }

    pub fn info(&self, message: impl Display) {
        println!("{} {}", self.prefix(), message);
    }

    /// ビルドスクリプトの出力行をそのまま流す
    pub fn line(&self, line: &str) {
        println!("{} {}", self.prefix(), line);
    }

    pub fn success(&self, message: impl Display) {
        println!("{} {}", self.prefix(), message.to_string().green());
    }

    pub fn skipped(&self) {
        println!("{} {}", self.prefix(), "skipped".yellow());
    }

    pub fn warn(&self, message: impl Display) {
        println!("{} {}", self.prefix(), message.to_string().yellow());
        tracing::warn!(service = self.name, "{}", message);
    }

    pub fn error(&self, message: impl Display) {
        println!("{} {}", self.prefix(), message.to_string().red());
    }
}

/// サービス間の区切り線
pub fn separator() {
    println!("{}", "-".repeat(SEPARATOR_WIDTH));
}
