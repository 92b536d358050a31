use apss_core::Severity;
use regex::Regex;

const MINER_TOKENS: [&str; 9] = [
    "xmrig",
    "minerd",
    "cpuminer",
    "cgminer",
    "bfgminer",
    "ethminer",
    "stratum",
    "cryptonight",
    "randomx",
];

const KNOWN_SHELLS: [&str; 8] = ["sh", "bash", "zsh", "fish", "csh", "tcsh", "dash", "ash"];
const SHELL_INTERACTIVE_ARGS: [&str; 3] = ["-i", "-il", "-li"];

/// Regexes describing the built-in reverse-shell command-line shapes named
/// : an interactive shell redirected to `/dev/tcp/...`, `nc -e`,
/// a scripting language opening a socket and exec'ing a shell, `mkfifo |
/// nc`, and `socat ... exec`.
fn reverse_shell_patterns() -> Vec<Regex> {
    [
        r"(?i)\b(bash|sh|zsh)\b.*-i.*>&\s*/dev/tcp/",
        r"(?i)\bnc\b(\.traditional)?\s+.*-e\s+\S*sh",
        r"(?i)(python3?|perl|ruby|php)\b.*\bsocket\b.*\bexec\b",
        r"(?i)mkfifo\s+\S+.*\bnc\b",
        r"(?i)\bsocat\b.*\bexec\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("built-in reverse-shell pattern must compile"))
    .collect()
}

fn mining_pool_url_pattern() -> Regex {
    Regex::new(r"(?i)stratum\+tcp://|pool\.[a-z0-9.-]+:\d{2,5}").expect("mining-pool pattern must compile")
}

/// Compiled indicator classifier. User-supplied "suspicious processes"
/// patterns are compiled once here alongside the built-in sets so a scan
/// never recompiles a regex.
pub struct IndicatorClassifier {
    user_patterns: Vec<(String, Regex)>,
    reverse_shell: Vec<Regex>,
    mining_pool_url: Regex,
}

impl IndicatorClassifier {
    pub fn new(user_patterns: &[String]) -> Self {
        let user_patterns = user_patterns
            .iter()
            .filter_map(|raw| Regex::new(raw).ok().map(|re| (raw.clone(), re)))
            .collect();
        Self {
            user_patterns,
            reverse_shell: reverse_shell_patterns(),
            mining_pool_url: mining_pool_url_pattern(),
        }
    }

    /// Classifies one process by name/command line, returning the
    /// indicator tags and the maximum severity implied by any of them,
    /// defaulting to INFO.
    pub fn classify(&self, name: &str, command_line: &[String]) -> (Vec<String>, Severity) {
        let joined = command_line.join(" ");
        let mut indicators = Vec::new();
        let mut severity = Severity::Info;

        for (pattern, re) in &self.user_patterns {
            if re.is_match(&joined) {
                indicators.push(format!("matches_pattern:{pattern}"));
                severity = severity.max(Severity::High);
            }
        }

        if self.reverse_shell.iter().any(|re| re.is_match(&joined)) {
            indicators.push("possible_reverse_shell".to_string());
            severity = severity.max(Severity::Critical);
        }

        if self.is_cryptominer(name, &joined) {
            indicators.push("possible_cryptominer".to_string());
            severity = severity.max(Severity::Critical);
        }

        if self.is_interactive_shell_spawn(name, command_line) {
            indicators.push("shell_spawn".to_string());
            severity = severity.max(Severity::Medium);
        }

        (indicators, severity)
    }

    fn is_cryptominer(&self, name: &str, joined_command_line: &str) -> bool {
        let haystack = format!("{name} {joined_command_line}").to_lowercase();
        MINER_TOKENS.iter().any(|token| haystack.contains(token))
            || self.mining_pool_url.is_match(joined_command_line)
    }

    fn is_interactive_shell_spawn(&self, name: &str, command_line: &[String]) -> bool {
        KNOWN_SHELLS.contains(&name)
            && command_line
                .iter()
                .any(|arg| SHELL_INTERACTIVE_ARGS.contains(&arg.as_str()))
    }
}
