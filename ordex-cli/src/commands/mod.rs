pub mod cluster;
pub mod config;
pub mod order;

use comfy_table::{Table, presets::UTF8_FULL};
use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct OutputContext {
    pub json: bool,
    pub verbose: bool,
}

impl OutputContext {
    pub fn print_table(&self, columns: &[&str], rows: &[Vec<String>]) {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(columns);

        for row in rows {
            table.add_row(row);
        }

        println!("{table}");
    }

    pub fn print_json<T: Serialize>(&self, data: &T) {
        match serde_json::to_string_pretty(data) {
            Ok(text) => println!("{}", text),
            Err(e) => self.print_error(&format!("cannot render JSON: {}", e)),
        }
    }

    pub fn print_success(&self, message: &str) {
        use colored::Colorize;
        println!("{} {}", "✓".green(), message);
    }

    pub fn print_error(&self, message: &str) {
        use colored::Colorize;
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn print_info(&self, message: &str) {
        use colored::Colorize;
        println!("{} {}", "ℹ".blue(), message);
    }
}
