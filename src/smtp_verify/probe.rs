use std::time::Duration;

use tracing::{debug, warn};

use super::error::ProbeError;
use super::options::VerifierOptions;
use super::policy::MailboxPolicy;
use super::session::SmtpSession;
use super::transport::{Connector, Transport};
use super::types::{Outcome, SmtpReply, Stage};

const QUIT_REPLY_WAIT: Duration = Duration::from_secs(2);

/// Ask `host` whether it would accept mail for `address`, without sending
/// any. Every failure, from a refused connection to a stalled reply, comes
/// back as [`Outcome::Indeterminate`]; the connection is always shut down
/// before returning.
pub fn probe<C>(
    connector: &C,
    host: &str,
    address: &str,
    options: &VerifierOptions,
    policy: &MailboxPolicy,
) -> Outcome
where
    C: Connector + ?Sized,
{
    let mut session = match SmtpSession::connect(
        connector,
        host,
        options.port,
        options.connect_timeout(),
    ) {
        Ok(session) => session,
        Err(source) => {
            let err = ProbeError::Connect {
                host: host.to_string(),
                source,
            };
            warn!(host, address, error = %err, "probe could not connect");
            return Outcome::Indeterminate;
        }
    };

    let outcome = match run_dialog(&mut session, address, options, policy) {
        Ok(outcome) => outcome,
        Err(err) if err.is_refusal() => {
            debug!(host, address, error = %err, "probe aborted by server");
            Outcome::Indeterminate
        }
        Err(err) => {
            warn!(host, address, error = %err, "probe failed");
            Outcome::Indeterminate
        }
    };
    session.close();
    debug!(host, address, %outcome, "probe finished");
    outcome
}

fn run_dialog<T: Transport>(
    session: &mut SmtpSession<T>,
    address: &str,
    options: &VerifierOptions,
    policy: &MailboxPolicy,
) -> Result<Outcome, ProbeError> {
    let greeting = session
        .read_reply(options.command_timeout())
        .map_err(|source| ProbeError::Reply {
            stage: Stage::Greeting,
            source,
        })?;
    ensure_not_refused(Stage::Greeting, &greeting)?;

    let helo = format!("HELO {}", options.helo_name());
    exchange(session, Stage::Helo, &helo, options)?;

    let mail_from = format!("MAIL FROM:<{}>", options.envelope_sender());
    exchange(session, Stage::MailFrom, &mail_from, options)?;

    let rcpt = format!("RCPT TO:<{address}>");
    session
        .send_command(&rcpt)
        .map_err(|source| ProbeError::Send {
            stage: Stage::RcptTo,
            source,
        })?;
    let reply = session
        .read_reply(options.rcpt_timeout())
        .map_err(|source| ProbeError::Reply {
            stage: Stage::RcptTo,
            source,
        })?;
    let outcome = policy.classify_rcpt(&reply);

    quit(session, options);
    Ok(outcome)
}

fn exchange<T: Transport>(
    session: &mut SmtpSession<T>,
    stage: Stage,
    command: &str,
    options: &VerifierOptions,
) -> Result<SmtpReply, ProbeError> {
    session
        .send_command(command)
        .map_err(|source| ProbeError::Send { stage, source })?;
    let reply = session
        .read_reply(options.command_timeout())
        .map_err(|source| ProbeError::Reply { stage, source })?;
    ensure_not_refused(stage, &reply)?;
    Ok(reply)
}

fn ensure_not_refused(stage: Stage, reply: &SmtpReply) -> Result<(), ProbeError> {
    if reply.is_permanent_failure() {
        return Err(ProbeError::Refused {
            stage,
            code: reply.code,
        });
    }
    Ok(())
}

/// Best effort; the outcome is already known.
fn quit<T: Transport>(session: &mut SmtpSession<T>, options: &VerifierOptions) {
    if let Err(err) = session.send_command("QUIT") {
        debug!(stage = %Stage::Quit, error = %err, "QUIT not sent");
        return;
    }
    if let Err(err) = session.read_reply(options.command_timeout().min(QUIT_REPLY_WAIT)) {
        debug!(stage = %Stage::Quit, error = %err, "no QUIT reply");
    }
}
