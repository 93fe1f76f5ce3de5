use crate::error::SubmitRejection;
use crate::exchange::ExchangeClient;
use crate::session::Session;
use crate::ui::view;
use chrono::Utc;
use log::{ debug, info };
use std::error::Error;
use tokio::io::{ AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt };

const LINE_WIDTH: usize = 80;
const QUIT_COMMANDS: [&str; 2] = ["/quit", "/exit"];

async fn write_line<W>(out: &mut W, line: &str) -> Result<(), Box<dyn Error + Send + Sync>>
    where W: AsyncWrite + Unpin
{
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}

async fn write_quota_status<W>(
    out: &mut W,
    session: &mut Session
) -> Result<(), Box<dyn Error + Send + Sync>>
    where W: AsyncWrite + Unpin
{
    let cooldown_hours = match session.policy() {
        Some(policy) => policy.cooldown_hours,
        None => {
            return Ok(());
        }
    };
    let remaining = session.remaining(Utc::now());
    if let Some(count) = remaining {
        write_line(out, &view::remaining_line(count)).await?;
    }
    if remaining == Some(0) {
        write_line(out, &view::quota_exhausted_notice(cooldown_hours)).await?;
        write_line(out, &view::input_placeholder(remaining, cooldown_hours)).await?;
    }
    Ok(())
}

/// Line-oriented chat loop. Each line is one submission; the loop does not
/// read the next line until the current turn has settled, so at most one
/// request is ever in flight.
pub async fn run_terminal<R, W>(
    exchange: &ExchangeClient,
    session: &mut Session,
    input: R,
    mut out: W
) -> Result<(), Box<dyn Error + Send + Sync>>
    where R: AsyncBufRead + Unpin, W: AsyncWrite + Unpin
{
    info!("Terminal session {} started (model={})", session.id(), exchange.model());

    write_line(&mut out, view::TITLE).await?;
    if session.conversation().is_empty() {
        write_line(&mut out, view::EMPTY_STATE).await?;
    }
    write_quota_status(&mut out, session).await?;
    if session.remaining(Utc::now()) != Some(0) {
        write_line(&mut out, view::INPUT_PROMPT).await?;
    }

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if QUIT_COMMANDS.contains(&line.trim()) {
            break;
        }

        let turn = match session.begin_turn(&line, Utc::now()) {
            Ok(turn) => turn,
            Err(SubmitRejection::EmptyInput) => {
                continue;
            }
            Err(rejection) => {
                debug!("Session {}: submission rejected: {}", session.id(), rejection);
                write_line(&mut out, &rejection.to_string()).await?;
                continue;
            }
        };

        if let Some(message) = session.conversation().last() {
            write_line(&mut out, &view::render_message(message, LINE_WIDTH)).await?;
        }
        write_line(&mut out, view::THINKING).await?;

        exchange.settle(session, turn).await;

        if let Some(message) = session.conversation().last() {
            write_line(&mut out, &view::render_message(message, LINE_WIDTH)).await?;
        }
        write_quota_status(&mut out, session).await?;
    }

    info!("Terminal session {} ended after {} message(s)", session.id(), session.size());
    Ok(())
}
