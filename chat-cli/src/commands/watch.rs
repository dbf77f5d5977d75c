//! Follow a conversation interactively.
//!
//! Stdin lines are sent as messages unless they start with `/`:
//!
//! ```text
//! /group            focus the project group
//! /private <user>   focus a private conversation
//! /members          show the focused group's members
//! /add <user>       add a member
//! /remove <user>    remove a member
//! /dismiss [id]     dismiss one notice, or all
//! /quit             leave
//! ```
//!
//! A leading `//` sends a literal `/`.

use anyhow::{Context, Result};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use huddle_client::{ChatApi, ChatSession, ClientConfig, Transport, Update};
use huddle_core::ConnectionEvent;
use huddle_types::{Conversation, GroupId, ProjectId, UserId};

use crate::render;

/// One parsed stdin line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Send(String),
    Group,
    Private(UserId),
    Members,
    Add(UserId),
    Remove(UserId),
    Dismiss(Option<u64>),
    Quit,
    Empty,
    Invalid(String),
}

impl Input {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Input::Empty;
        }
        if let Some(literal) = line.strip_prefix("//") {
            return Input::Send(format!("/{literal}"));
        }
        let Some(command) = line.strip_prefix('/') else {
            return Input::Send(line.to_string());
        };

        let mut words = command.split_whitespace();
        let name = words.next().unwrap_or_default();
        let arg = words.next();
        match (name, arg) {
            ("group", _) => Input::Group,
            ("members", _) => Input::Members,
            ("quit" | "exit", _) => Input::Quit,
            ("private", Some(user)) => Input::Private(user.into()),
            ("add", Some(user)) => Input::Add(user.into()),
            ("remove", Some(user)) => Input::Remove(user.into()),
            ("dismiss", None) => Input::Dismiss(None),
            ("dismiss", Some(id)) => match id.parse() {
                Ok(id) => Input::Dismiss(Some(id)),
                Err(_) => Input::Invalid(format!("not a notice id: {id}")),
            },
            ("private" | "add" | "remove", None) => {
                Input::Invalid(format!("usage: /{name} <user>"))
            }
            _ => Input::Invalid(format!("unknown command: /{name}")),
        }
    }
}

/// Run the watch command.
pub async fn run(config: &ClientConfig, project: ProjectId, peer: Option<UserId>) -> Result<()> {
    let mut session = ChatSession::from_config(config);
    if let Err(e) = session.start().await {
        warn!(error = %e, "push channel unavailable, retrying in the background");
    }

    let group = session
        .open_project(&project, peer)
        .await
        .context("Failed to open project")?;
    let mut view = View::new(project, group, std::io::stdout());
    view.banner(&session)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            update = session.next_update() => match update {
                Some(update) => view.render(&session, update)?,
                None => break,
            },
            line = lines.next_line() => match line? {
                Some(line) => {
                    let input = Input::parse(&line);
                    if input == Input::Quit {
                        break;
                    }
                    if let Err(e) = view.execute(&mut session, input).await {
                        eprintln!("error: {e:#}");
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.shutdown().await;
    Ok(())
}

/// Incremental timeline printer.
struct View<W> {
    project: ProjectId,
    group: GroupId,
    printed: usize,
    out: W,
}

impl<W: Write> View<W> {
    fn new(project: ProjectId, group: GroupId, out: W) -> Self {
        Self {
            project,
            group,
            printed: 0,
            out,
        }
    }

    fn banner<T, A>(&mut self, session: &ChatSession<T, A>) -> Result<()>
    where
        T: Transport + 'static,
        A: ChatApi + Clone + 'static,
    {
        self.printed = 0;
        if let Some(target) = session.focused() {
            writeln!(self.out, "{}", render::focus_banner(target))?;
        }
        Ok(())
    }

    /// Print timeline entries not yet shown.
    fn flush<T, A>(&mut self, session: &ChatSession<T, A>) -> Result<()>
    where
        T: Transport + 'static,
        A: ChatApi + Clone + 'static,
    {
        let entries = session.timeline().entries();
        for message in entries.iter().skip(self.printed) {
            writeln!(self.out, "{}", render::message_line(message))?;
        }
        self.printed = entries.len();
        Ok(())
    }

    fn render<T, A>(&mut self, session: &ChatSession<T, A>, update: Update) -> Result<()>
    where
        T: Transport + 'static,
        A: ChatApi + Clone + 'static,
    {
        match update {
            Update::Timeline(_) => self.flush(session)?,
            Update::Background { from, message } => {
                writeln!(self.out, "(new from {from}: {})", message.content)?;
            }
            Update::Members { members, .. } => {
                writeln!(self.out, "(members: {})", render::member_list(&members))?;
            }
            Update::Notice(notice) => eprintln!("! [{}] {}", notice.id, notice.text),
            Update::Connection(ConnectionEvent::Connected) => eprintln!("(connected)"),
            Update::Connection(ConnectionEvent::Disconnected { reason }) => {
                eprintln!("(disconnected: {reason})")
            }
            Update::Connection(ConnectionEvent::ConnectFailed { .. }) => {}
        }
        Ok(())
    }

    async fn execute<T, A>(&mut self, session: &mut ChatSession<T, A>, input: Input) -> Result<()>
    where
        T: Transport + 'static,
        A: ChatApi + Clone + 'static,
    {
        match input {
            Input::Send(text) => {
                session.send(&text).await?;
                self.flush(session)?;
            }
            Input::Group => {
                let target = Conversation::group(self.group.clone(), self.project.clone());
                session.focus(target).await?;
                self.banner(session)?;
            }
            Input::Private(peer) => {
                session.focus(Conversation::private(peer)).await?;
                self.banner(session)?;
            }
            Input::Members => {
                writeln!(self.out, "members: {}", render::member_list(session.members()))?;
            }
            Input::Add(user) => {
                let members = session.add_member(&user).await?;
                writeln!(self.out, "members: {}", render::member_list(&members))?;
            }
            Input::Remove(user) => {
                let members = session.remove_member(&user).await?;
                writeln!(self.out, "members: {}", render::member_list(&members))?;
            }
            Input::Dismiss(Some(id)) => {
                if !session.dismiss(id) {
                    writeln!(self.out, "no notice {id}")?;
                }
            }
            Input::Dismiss(None) => {
                let ids: Vec<u64> = session.notices().iter().map(|n| n.id).collect();
                for id in ids {
                    session.dismiss(id);
                }
            }
            Input::Invalid(reason) => writeln!(self.out, "{reason}")?,
            Input::Quit | Input::Empty => {}
        }
        Ok(())
    }
}
