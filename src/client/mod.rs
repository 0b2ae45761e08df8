//! tcpping client.
//!
//! A run resolves the target, connects to the first candidate that accepts,
//! then probes over that single connection until the count is reached,
//! cancellation is requested or the connection fails. The summary is
//! reported in every case once a connection existed.

pub mod connect;
pub mod probe;
pub mod report;
pub mod resolver;
pub mod stats;

pub use probe::{ProbeSettings, SessionReport, Termination};
pub use report::{ConsoleReporter, Event, Reporter};
pub use resolver::{Family, Target};

use crate::config::ClientConfig;
use crate::error::Error;
use crate::runtime::CancelToken;

/// Run one client session described by `config`.
///
/// Errors only cover failures before the session starts; a session that
/// ends on a transport error still returns its report. `Ok(None)` means
/// cancellation arrived before a connection was up, so there is nothing to
/// summarize.
pub fn run(
    config: &ClientConfig,
    token: &CancelToken,
    reporter: &mut dyn Reporter,
) -> Result<Option<SessionReport>, Error> {
    let target = Target::new(config.host.as_str(), config.port, config.family);
    reporter.report(Event::Resolving {
        target: target.clone(),
    });

    // Name lookup itself cannot be interrupted; cancellation is honored as
    // soon as it returns.
    let candidates = resolver::resolve(&target)?;
    if token.is_cancelled() {
        return Ok(None);
    }

    let conn = match connect::establish(
        &target,
        &candidates,
        config.connect_timeout,
        token,
        reporter,
    )? {
        Some(conn) => conn,
        None => return Ok(None),
    };

    let settings = ProbeSettings {
        count: config.count,
        interval: config.interval,
        timeout: config.timeout,
    };
    reporter.report(Event::Started {
        interval: settings.interval,
    });

    let report = probe::run(conn, &settings, token, reporter);
    reporter.report(Event::Finished {
        host: target.host.clone(),
        stats: report.stats.clone(),
    });

    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::server::Dispatcher;
    use std::net::{SocketAddr, TcpListener};
    use std::thread;
    use std::time::Duration;

    fn client_config(port: u16) -> ClientConfig {
        ClientConfig {
            host: "127.0.0.1".to_string(),
            port,
            family: Family::V4,
            count: Some(3),
            interval: Duration::from_secs(1),
            timeout: Some(Duration::from_secs(5)),
            connect_timeout: Some(Duration::from_secs(2)),
            log_level: "info".to_string(),
        }
    }

    fn start_server() -> u16 {
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        let dispatcher = Dispatcher::bind(&config).unwrap();
        let port = dispatcher.local_addr().unwrap().port();
        tokio::spawn(dispatcher.run());
        port
    }

    fn count(events: &[Event], pred: fn(&Event) -> bool) -> usize {
        events.iter().filter(|event| pred(event)).count()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_session_against_server() {
        let config = client_config(start_server());

        let (report, events) = tokio::task::spawn_blocking(move || {
            let mut events: Vec<Event> = Vec::new();
            let report = run(&config, &CancelToken::new(), &mut events)
                .unwrap()
                .unwrap();
            (report, events)
        })
        .await
        .unwrap();

        assert!(matches!(report.termination, Termination::Completed));
        assert_eq!(count(&events, |e| matches!(e, Event::Reply(_))), 3);
        assert!(matches!(events.first(), Some(Event::Resolving { .. })));
        assert!(matches!(events.last(), Some(Event::Finished { .. })));

        let summary = report.stats.summary().unwrap();
        assert_eq!(summary.transmitted, 3);
        assert_eq!(summary.received, 3);
        assert_eq!(summary.lost, 0);
        assert!(summary.min_us <= summary.avg_us && summary.avg_us <= summary.max_us);
    }

    #[test]
    fn test_unreachable_target() {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let mut events: Vec<Event> = Vec::new();
        let err = run(&client_config(port), &CancelToken::new(), &mut events).unwrap_err();

        assert!(matches!(err, Error::Connect { .. }));
        assert_eq!(count(&events, |e| matches!(e, Event::Reply(_))), 0);
        assert_eq!(count(&events, |e| matches!(e, Event::Finished { .. })), 0);
    }

    #[test]
    fn test_silent_server_loses_one_probe() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        let holder = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_secs(2));
            drop(stream);
        });

        let mut config = client_config(addr.port());
        config.count = None;
        config.timeout = Some(Duration::from_millis(500));

        let mut events: Vec<Event> = Vec::new();
        let report = run(&config, &CancelToken::new(), &mut events)
            .unwrap()
            .unwrap();

        assert!(matches!(report.termination, Termination::Transport(_)));
        assert_eq!(report.stats.transmitted(), 1);
        assert_eq!(report.stats.lost(), 1);
        assert_eq!(count(&events, |e| matches!(e, Event::Lost { .. })), 1);
        assert!(matches!(events.last(), Some(Event::Finished { .. })));

        holder.join().unwrap();
    }

    #[test]
    fn test_cancelled_before_connect_prints_no_summary() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let token = CancelToken::new();
        token.cancel();

        let mut events: Vec<Event> = Vec::new();
        let result = run(
            &client_config(listener.local_addr().unwrap().port()),
            &token,
            &mut events,
        )
        .unwrap();

        assert!(result.is_none());
        assert!(matches!(events.as_slice(), [Event::Resolving { .. }]));
    }

    #[test]
    fn test_family_filter_without_match() {
        let mut config = client_config(50414);
        config.family = Family::V6;

        let err = run(&config, &CancelToken::new(), &mut Vec::<Event>::new()).unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
    }
}
