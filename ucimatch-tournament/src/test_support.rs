//! Scripted shell engines for unit tests

use ucimatch_engine::{EngineConfiguration, EngineLimits};

/// Answers every search instantly with a scored info line and `e2e4`
pub const FAKE_ENGINE: &str = r#"
while read -r cmd rest; do
  case "$cmd" in
    uci) echo "id name Fake"; echo "uciok" ;;
    isready) echo "readyok" ;;
    go) echo "info depth 1 score cp 12 nodes 20 pv e2e4"; echo "bestmove e2e4" ;;
    quit) exit 0 ;;
  esac
done
"#;

/// Exits as soon as it is asked to search
pub const CRASHING_ENGINE: &str = r#"
while read -r cmd rest; do
  case "$cmd" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
    go) exit 1 ;;
    quit) exit 0 ;;
  esac
done
"#;

/// Never answers a search
pub const SILENT_ENGINE: &str = r#"
while read -r cmd rest; do
  case "$cmd" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
    quit) exit 0 ;;
  esac
done
"#;

/// Replies with a move that is not in coordinate notation
pub const GARBAGE_ENGINE: &str = r#"
while read -r cmd rest; do
  case "$cmd" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
    go) echo "info depth 1 score cp 0"; echo "bestmove Nf3" ;;
    quit) exit 0 ;;
  esac
done
"#;

/// Has no legal move and reports being mated
pub const MATED_ENGINE: &str = r#"
while read -r cmd rest; do
  case "$cmd" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
    go) echo "info depth 1 score mate 0"; echo "bestmove (none)" ;;
    quit) exit 0 ;;
  esac
done
"#;

/// Shell engine named `name` with a depth bound
pub fn shell_engine(name: &str, script: &str) -> EngineConfiguration {
    EngineConfiguration::new("/bin/sh")
        .with_name(name)
        .with_arg("-c")
        .with_arg(script)
        .with_limits(EngineLimits::default().with_depth(1))
}
