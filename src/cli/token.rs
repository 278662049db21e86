use crate::error::SagepipeError;
use crate::runtime::Runtime;

/// Keep the first and last few characters of a token.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Print a valid access token, refreshing it first if needed.
pub async fn run_token(runtime: &Runtime, show: bool) -> Result<(), SagepipeError> {
    let token = runtime.token_manager().get_valid_access_token().await?;
    if show {
        println!("{token}");
    } else {
        println!("{}", mask_token(&token));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_long_token() {
        assert_eq!(mask_token("abcdefghijklmnop"), "abcd...mnop");
    }

    #[test]
    fn mask_short_token_entirely() {
        assert_eq!(mask_token("abc"), "***");
        assert_eq!(mask_token(""), "");
    }
}
