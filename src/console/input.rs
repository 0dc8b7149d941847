use anyhow::Result;
use colored::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Read one line from stdin, trimmed. End of input reads as a quit command.
pub async fn get_user_input() -> Result<String> {
    prompt_user(&format!("{} ", "❓ Ask a question:".bright_cyan().bold())).await
}

pub async fn prompt_user(prompt_text: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(prompt_text.as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    let read = BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    if read == 0 {
        return Ok("exit".to_string());
    }
    Ok(line.trim().to_string())
}

pub fn is_quit_command(input_text: &str) -> bool {
    matches!(
        input_text.trim().to_lowercase().as_str(),
        "exit" | "quit" | "/quit" | "/exit"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_commands() {
        assert!(is_quit_command("exit"));
        assert!(is_quit_command("EXIT"));
        assert!(is_quit_command("  /quit "));
        assert!(!is_quit_command("exit the loop early?"));
        assert!(!is_quit_command(""));
    }
}
