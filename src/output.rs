use serde::Serialize;

pub trait OutputFormatter {
    fn format_text(&self) -> String;
    fn format_json(&self, pretty: bool) -> crate::Result<String>;
}

pub fn print_output<T: OutputFormatter>(data: &T, as_json: bool) -> crate::Result<()> {
    let output = if as_json {
        data.format_json(true)?
    } else {
        data.format_text()
    };

    println!("{}", output);
    Ok(())
}

pub fn to_json<T: Serialize>(data: &T, pretty: bool) -> crate::Result<String> {
    if pretty {
        Ok(serde_json::to_string_pretty(data)?)
    } else {
        Ok(serde_json::to_string(data)?)
    }
}

pub mod text {
    use colored::Colorize;

    pub fn bullet(msg: &str) -> String {
        format!("  {} {}", "•".cyan(), msg)
    }
}
