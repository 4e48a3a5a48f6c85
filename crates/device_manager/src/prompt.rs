use async_trait::async_trait;
use registry::Confirmer;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, Lines};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Operator input shared by the command loop and confirmation prompts
pub type SharedLines<R> = Arc<Mutex<Lines<R>>>;

/// Confirmer that asks on stdout and reads the answer from operator input.
/// Anything other than `y` or `yes` declines, as do end of input and
/// shutdown while the question is pending.
pub struct PromptConfirmer<R> {
    input: SharedLines<R>,
    shutdown: CancellationToken,
}

impl<R> PromptConfirmer<R> {
    pub fn new(input: SharedLines<R>, shutdown: CancellationToken) -> Self {
        Self { input, shutdown }
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[async_trait]
impl<R> Confirmer for PromptConfirmer<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn confirm(&self, prompt: &str) -> bool {
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "{} [y/N] ", prompt);
        let _ = stdout.flush();

        let answer = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                debug!("confirmation interrupted");
                return false;
            }
            answer = async { self.input.lock().await.next_line().await } => answer,
        };

        match answer {
            Ok(Some(answer)) => is_affirmative(&answer),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "failed to read confirmation answer");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};

    fn input(text: &'static str) -> SharedLines<&'static [u8]> {
        Arc::new(Mutex::new(text.as_bytes().lines()))
    }

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative("y"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative("yep"));
    }

    #[tokio::test]
    async fn test_prompt_reads_one_answer_per_question() {
        let confirmer = PromptConfirmer::new(input("yes\nn\n"), CancellationToken::new());
        assert!(confirmer.confirm("delete?").await);
        assert!(!confirmer.confirm("delete?").await);
        // end of input declines
        assert!(!confirmer.confirm("delete?").await);
    }

    #[tokio::test]
    async fn test_shutdown_declines_pending_question() {
        // the writer half stays open so the read never completes on its own
        let (_writer, reader) = tokio::io::duplex(64);
        let shutdown = CancellationToken::new();
        let confirmer =
            PromptConfirmer::new(Arc::new(Mutex::new(BufReader::new(reader).lines())), shutdown.clone());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            shutdown.cancel();
        });

        let answer = tokio::time::timeout(Duration::from_secs(1), confirmer.confirm("delete?")).await;
        assert_eq!(answer, Ok(false));
    }
}
