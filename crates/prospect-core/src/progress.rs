/// Display tone of one progress log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTone {
    Error,
    Success,
    Interrupted,
    Normal,
}

const ERROR_WORDS: [&str; 4] = ["erro", "falha", "error", "fail"];
const SUCCESS_WORDS: [&str; 4] = ["concluída", "sucesso", "completed", "success"];
const INTERRUPTED_WORDS: [&str; 3] = ["interrompido", "stopped", "paused"];

/// Classify a log line by keyword. Errors win over success, success over
/// interruption.
///
/// Keywords match the start of a word, so "erro" hits "erros" but not
/// "interrompido".
pub fn classify(line: &str) -> LogTone {
    let lower = line.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect();
    let has = |words: &[&str]| {
        tokens
            .iter()
            .any(|token| words.iter().any(|word| token.starts_with(word)))
    };
    if has(&ERROR_WORDS) {
        LogTone::Error
    } else if has(&SUCCESS_WORDS) {
        LogTone::Success
    } else if has(&INTERRUPTED_WORDS) {
        LogTone::Interrupted
    } else {
        LogTone::Normal
    }
}

/// Non-blank lines of a progress log, each with its tone.
pub fn log_lines(text: &str) -> Vec<(LogTone, &str)> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| (classify(line), line))
        .collect()
}
