//! Terminal feed view
//!
//! Renders the feed and session state and forwards user intents to the
//! session manager and feed cache. It keeps no business state of its own
//! beyond an unsent draft and the email of a sign-in awaiting its code.

use crate::config::ViewConfig;
use crate::output::renderer::{FeedRenderer, Frame, StatusLine};
use crate::view::command::Command;
use crate::view::input::{TerminalEmailPrompt, TerminalInput};
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tradehub_application::{
    ChangeListener, EmailPrompt, FeedCache, IdentityProvider, NotificationChannel, RemoteStore,
    SessionManager, SignInOutcome,
};
use tradehub_domain::Session;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

enum Flow {
    Continue,
    Quit,
}

/// Interactive feed screen
pub struct FeedView<P, S, C>
where
    P: IdentityProvider + 'static,
    S: RemoteStore + 'static,
    C: NotificationChannel + 'static,
{
    sessions: Arc<SessionManager<P>>,
    cache: FeedCache<S>,
    listener: ChangeListener<C, S>,
    input: TerminalInput,
    prompt: Box<dyn EmailPrompt>,
    renderer: FeedRenderer,
    out: Box<dyn Write + Send>,
    clear_screen: bool,
    status: Option<StatusLine>,
    draft: Option<String>,
    pending_email: Option<String>,
    show_help: bool,
}

impl<P, S, C> FeedView<P, S, C>
where
    P: IdentityProvider + 'static,
    S: RemoteStore + 'static,
    C: NotificationChannel + 'static,
{
    pub fn new(
        sessions: Arc<SessionManager<P>>,
        cache: FeedCache<S>,
        listener: ChangeListener<C, S>,
        input: TerminalInput,
        config: &ViewConfig,
    ) -> Self {
        Self {
            sessions,
            cache,
            listener,
            prompt: Box::new(TerminalEmailPrompt::new(input.clone())),
            input,
            renderer: FeedRenderer::new(config.timestamp_format.clone()),
            out: Box::new(io::stdout()),
            clear_screen: config.clear_screen,
            status: None,
            draft: None,
            pending_email: None,
            show_help: false,
        }
    }

    pub fn with_prompt(mut self, prompt: impl EmailPrompt + 'static) -> Self {
        self.prompt = Box::new(prompt);
        self
    }

    pub fn with_output(mut self, out: impl Write + Send + 'static) -> Self {
        self.out = Box::new(out);
        self
    }

    /// Text of the last failed post, kept for `/retry`
    pub fn draft(&self) -> Option<&str> {
        self.draft.as_deref()
    }

    pub fn status(&self) -> Option<&StatusLine> {
        self.status.as_ref()
    }

    /// Run until `/quit` or end of input, then stop listening for changes
    pub async fn run(&mut self) -> io::Result<()> {
        self.start().await;
        let result = self.event_loop().await;
        self.stop().await;
        result
    }

    async fn start(&mut self) {
        match self.sessions.get_current_session().await {
            Ok(Some(session)) => info!(user_id = %session.user_id(), "Resumed session"),
            Ok(None) => debug!("No session to resume"),
            Err(e) => self.status = Some(StatusLine::Error(e.to_string())),
        }

        if let Err(e) = self.listener.subscribe().await {
            self.status = Some(StatusLine::Error(e.to_string()));
        }

        // Failures land in the snapshot's last_error
        let cache = self.cache.clone();
        tokio::spawn(async move {
            if let Err(e) = cache.refresh().await {
                debug!(error = %e, "Initial load failed");
            }
        });
    }

    async fn event_loop(&mut self) -> io::Result<()> {
        let input = self.input.clone();
        let mut feed = self.cache.watch();
        let mut session = self.sessions.watch();

        self.render()?;
        loop {
            tokio::select! {
                line = input.next_line() => {
                    let Some(line) = line else {
                        debug!("Input closed");
                        break;
                    };
                    if let Flow::Quit = self.handle_line(&line).await {
                        break;
                    }
                }
                changed = feed.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = session.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            self.render()?;
        }
        Ok(())
    }

    async fn stop(&mut self) {
        if let Err(e) = self.listener.teardown().await {
            warn!(error = %e, "Listener teardown failed");
        }
    }

    async fn handle_line(&mut self, line: &str) -> Flow {
        let command = Command::parse(line);
        if command != Command::Empty {
            self.status = None;
        }

        match command {
            Command::Empty => {}
            Command::Quit => return Flow::Quit,
            Command::Help => self.show_help = true,
            Command::SignIn => self.sign_in().await,
            Command::Verify(code) => self.verify(&code).await,
            Command::SignOut => self.sign_out().await,
            Command::Refresh => self.refresh().await,
            Command::Retry => match self.draft.clone() {
                Some(draft) => self.submit(draft).await,
                None => self.status = Some(StatusLine::Info("Nothing to retry".to_string())),
            },
            Command::Compose(text) => self.submit(text).await,
            Command::Unknown(command) => {
                self.status = Some(StatusLine::Error(format!(
                    "Unknown command: {}. Type /help for commands",
                    command
                )));
            }
        }
        Flow::Continue
    }

    async fn sign_in(&mut self) {
        if let Some(session) = self.sessions.current() {
            self.status = Some(StatusLine::Info(format!(
                "Already signed in as {}",
                account_name(&session)
            )));
            return;
        }

        let outcome = self.sessions.sign_in_with(self.prompt.as_ref()).await;
        self.status = Some(match outcome {
            Ok(SignInOutcome::Dismissed) => StatusLine::Info("Sign-in cancelled".to_string()),
            Ok(SignInOutcome::LinkSent { email }) => {
                let message = format!(
                    "Sign-in link sent to {}. Enter the code with /verify <code>",
                    email
                );
                self.pending_email = Some(email);
                StatusLine::Info(message)
            }
            Ok(SignInOutcome::SignedIn(session)) => {
                self.pending_email = None;
                StatusLine::Info(format!("Signed in as {}", account_name(&session)))
            }
            Err(e) => StatusLine::Error(e.to_string()),
        });
    }

    async fn verify(&mut self, code: &str) {
        let Some(email) = self.pending_email.clone() else {
            self.status = Some(StatusLine::Error(
                "No sign-in in progress. Start with /signin".to_string(),
            ));
            return;
        };

        self.status = Some(match self.sessions.complete_sign_in(&email, code).await {
            Ok(session) => {
                self.pending_email = None;
                StatusLine::Info(format!("Signed in as {}", account_name(&session)))
            }
            Err(e) => StatusLine::Error(e.to_string()),
        });
    }

    async fn sign_out(&mut self) {
        if !self.sessions.is_signed_in() {
            self.status = Some(StatusLine::Info("Not signed in".to_string()));
            return;
        }

        self.status = Some(match self.sessions.sign_out().await {
            Ok(()) => StatusLine::Info("Signed out".to_string()),
            Err(e) => StatusLine::Error(format!("Signed out locally, but: {}", e)),
        });
    }

    async fn refresh(&mut self) {
        // A failure is rendered from the snapshot
        if let Ok(feed) = self.cache.refresh().await {
            self.status = Some(StatusLine::Info(format!("{} posts", feed.len())));
        }
    }

    async fn submit(&mut self, text: String) {
        let session = self.sessions.current();
        match self.cache.create(session.as_ref(), &text).await {
            Ok(()) => {
                self.draft = None;
                self.status = Some(StatusLine::Info("Posted".to_string()));
            }
            Err(e) => {
                self.draft = Some(text);
                self.status = Some(StatusLine::Error(e.to_string()));
            }
        }
    }

    fn render(&mut self) -> io::Result<()> {
        let snapshot = self.cache.snapshot();
        let session = self.sessions.current();

        let mut screen = String::new();
        if self.clear_screen {
            screen.push_str(CLEAR_SCREEN);
        }
        screen.push_str(&self.renderer.render(Frame {
            snapshot: &snapshot,
            session: session.as_ref(),
            status: self.status.as_ref(),
            draft: self.draft.as_deref(),
        }));
        if std::mem::take(&mut self.show_help) {
            screen.push('\n');
            screen.push_str(&FeedRenderer::help());
        }
        screen.push_str(&FeedRenderer::prompt(session.as_ref()));

        self.out.write_all(screen.as_bytes())?;
        self.out.flush()
    }
}

fn account_name(session: &Session) -> &str {
    session
        .email()
        .unwrap_or_else(|| session.user_id().as_str())
}
