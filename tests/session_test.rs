#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use lottery_agency::protocol::{unframe, END_MARKER};
    use lottery_agency::{
        cancel_pair, run_agency, AgencyConfig, AgencyError, BetRecord, CancelToken, PartialConfig,
        SessionLimits, SessionState, Transport, TracingReporter, UploadSession, VecSource,
    };
    use std::collections::BTreeSet;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Winning number used by the fake aggregator.
    const WINNING_NUMBER: &str = "7574";

    /// What the fake aggregator saw from the agency.
    #[derive(Debug, Default)]
    struct Received {
        frames: usize,
        records: Vec<BetRecord>,
        agency: u8,
    }

    /// Minimal aggregator: acks every frame, stops at the end-marker, then
    /// answers the winner query one byte per write.
    async fn serve_one(mut sock: TcpStream) -> anyhow::Result<Received> {
        let mut received = Received::default();
        loop {
            let first = sock.read_u8().await?;
            if first == END_MARKER {
                break;
            }
            let second = sock.read_u8().await?;
            let len = u16::from_be_bytes([first, second]) as usize;
            let mut framed = vec![first, second];
            framed.resize(2 + len, 0);
            sock.read_exact(&mut framed[2..]).await?;

            let mut payload: Bytes = unframe(&framed)?;
            while !payload.is_empty() {
                received.records.push(BetRecord::decode(&mut payload, "")?);
            }
            received.frames += 1;
            sock.write_u8(1).await?;
        }

        received.agency = sock.read_u8().await?;
        let winners: BTreeSet<u32> = received
            .records
            .iter()
            .filter(|r| r.number == WINNING_NUMBER)
            .map(|r| r.document.parse::<u32>())
            .collect::<Result<_, _>>()?;

        let mut response = (winners.len() as u16).to_be_bytes().to_vec();
        for id in &winners {
            response.extend_from_slice(&id.to_be_bytes());
        }
        for b in response {
            sock.write_u8(b).await?;
            sock.flush().await?;
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        Ok(received)
    }

    async fn aggregator() -> anyhow::Result<(String, JoinHandle<anyhow::Result<Received>>)> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?.to_string();
        let handle = tokio::spawn(async move {
            let (sock, _) = listener.accept().await?;
            serve_one(sock).await
        });
        Ok((addr, handle))
    }

    fn bet(document: u32, number: &str) -> BetRecord {
        BetRecord::new("1", "Lucia", "Fernandez", document.to_string(), "1991-02-03", number)
    }

    #[tokio::test]
    async fn test_session_against_fake_aggregator() -> anyhow::Result<()> {
        let (addr, server) = aggregator().await?;

        let records: Vec<BetRecord> = (0..25)
            .map(|i| {
                let number = if i % 10 == 3 { WINNING_NUMBER } else { "1" };
                bet(40_000_000 + i, number)
            })
            .collect();
        let mut source = VecSource::new(records.clone());

        let transport = Transport::connect(&addr, Duration::from_secs(2), CancelToken::never()).await?;
        let reporter = TracingReporter;
        let limits = SessionLimits {
            max_batch_records: 10,
            ..Default::default()
        };
        let mut session = UploadSession::new("1", transport, limits, &reporter)?;
        let summary = session.run(&mut source).await?;

        assert_eq!(session.state(), SessionState::Done);
        assert_eq!(summary.batches, 3);
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.records, 25);
        assert_eq!(summary.winners, vec![40_000_003, 40_000_013, 40_000_023]);
        assert_eq!(source.close_calls(), 1);

        let received = server.await??;
        assert_eq!(received.frames, 3);
        assert_eq!(received.agency, 1);
        let documents: Vec<&str> = received.records.iter().map(|r| r.document.as_str()).collect();
        let expected: Vec<&str> = records.iter().map(|r| r.document.as_str()).collect();
        assert_eq!(documents, expected);
        Ok(())
    }

    #[tokio::test]
    async fn test_run_agency_from_bets_file() -> anyhow::Result<()> {
        let (addr, server) = aggregator().await?;

        let mut bets = NamedTempFile::new()?;
        writeln!(bets, "Santiago,Lorca,30904465,1999-03-17,7574")?;
        writeln!(bets, "Ana,Diaz,11111111,2000-01-01,12")?;
        writeln!(bets, "Juan,Perez,22222222,1980-05-05,7574")?;
        bets.flush()?;

        let config = AgencyConfig::resolve(PartialConfig {
            id: Some("2".to_string()),
            server_address: Some(addr),
            max_batch_amount: Some(2),
            bets_file: Some(bets.path().to_path_buf()),
            ..Default::default()
        })?;

        let summary = run_agency(&config, CancelToken::never(), &TracingReporter).await?;
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.winners, vec![22_222_222, 30_904_465]);

        let received = server.await??;
        assert_eq!(received.agency, 2);
        assert_eq!(received.records.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_run_agency_connection_refused() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?.to_string();
        drop(listener);

        let config = AgencyConfig::resolve(PartialConfig {
            id: Some("1".to_string()),
            server_address: Some(addr),
            ..Default::default()
        })?;
        let err = run_agency(&config, CancelToken::never(), &TracingReporter)
            .await
            .unwrap_err();
        assert!(matches!(err, AgencyError::Connection { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_unblocks_silent_server() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?.to_string();
        // Accepts and reads, never acks.
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await?;
            let mut sink = Vec::new();
            sock.read_to_end(&mut sink).await?;
            anyhow::Ok(sink)
        });

        let (cancel, token) = cancel_pair();
        let transport = Transport::connect(&addr, Duration::from_secs(2), token).await?;
        let reporter = TracingReporter;
        let mut session = UploadSession::new("9", transport, SessionLimits::default(), &reporter)?;
        let mut source = VecSource::new(vec![bet(1, "1"), bet(2, "2")]);

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });
        let err = tokio::time::timeout(Duration::from_secs(5), session.run(&mut source))
            .await?
            .unwrap_err();
        canceller.await?;

        assert!(err.is_cancelled());
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(source.close_calls(), 1);

        // Dropping the socket ends the server's read with EOF.
        let sink = tokio::time::timeout(Duration::from_secs(5), server).await???;
        let len = u16::from_be_bytes([sink[0], sink[1]]) as usize;
        assert_eq!(sink.len(), 2 + len);
        Ok(())
    }
}
