//! RPC Module Tests
//!
//! Validates the frame codec and the client's correlation, timeout and
//! failure classification against hand-rolled peers on loopback sockets.

#[cfg(test)]
mod tests {
    use crate::error::RpcError;
    use crate::ring::{Identifier, PeerHandle};
    use crate::rpc::client::RpcClient;
    use crate::rpc::protocol::{
        self, ERR_NOT_OWNER, KIND_ERROR, KIND_PING, KIND_REPLY_FLAG, Reply, Request,
    };

    use std::time::Duration;
    use tokio::net::TcpListener;

    // ============================================================
    // CODEC TESTS
    // ============================================================

    #[test]
    fn test_request_kind_mapping() {
        assert_eq!(Request::Ping.kind(), KIND_PING);
        assert_eq!(
            Request::FindSuccessor { id: Identifier(7) }.kind(),
            protocol::KIND_FIND_SUCCESSOR
        );
        assert_eq!(Request::ListJobs.kind(), protocol::KIND_LIST_JOBS);
    }

    #[tokio::test]
    async fn test_frame_round_trip() {
        let frame = protocol::encode_request(
            99,
            &Request::FindSuccessor {
                id: Identifier(0xDEAD_BEEF),
            },
        )
        .unwrap();

        let mut wire = Vec::new();
        protocol::write_frame(&mut wire, &frame).await.unwrap();

        // 4-byte big-endian length prefix covers correlation + kind + body
        let len = u32::from_be_bytes(wire[..4].try_into().unwrap()) as usize;
        assert_eq!(len, wire.len() - 4);

        let decoded = protocol::read_frame(&mut wire.as_slice()).await.unwrap();
        assert_eq!(decoded, frame);

        match protocol::decode_request(&decoded).unwrap() {
            Request::FindSuccessor { id } => assert_eq!(id, Identifier(0xDEAD_BEEF)),
            other => panic!("wrong request decoded: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reply_frame_sets_high_bit() {
        let frame = protocol::encode_reply(7, KIND_PING, &Reply::Pong).unwrap();
        assert_eq!(frame.kind, KIND_PING | KIND_REPLY_FLAG);

        let reply = protocol::decode_reply(KIND_PING, &frame).unwrap();
        assert!(matches!(reply, Reply::Pong));
    }

    #[test]
    fn test_error_frame_decodes_to_remote_error() {
        let frame = protocol::encode_error(7, ERR_NOT_OWNER, "node-b:6501");
        assert_eq!(frame.kind, KIND_ERROR);

        match protocol::decode_reply(KIND_PING, &frame) {
            Err(RpcError::Remote { code, message }) => {
                assert_eq!(code, ERR_NOT_OWNER);
                assert_eq!(message, "node-b:6501");
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[test]
    fn test_mismatched_reply_kind_is_corrupt() {
        let frame = protocol::encode_reply(7, protocol::KIND_GET, &Reply::Value(None)).unwrap();
        assert!(matches!(
            protocol::decode_reply(KIND_PING, &frame),
            Err(RpcError::FrameCorrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&(u32::MAX).to_be_bytes());
        wire.extend_from_slice(&[0u8; 16]);

        assert!(protocol::read_frame(&mut wire.as_slice()).await.is_err());
    }

    #[tokio::test]
    async fn test_truncated_frame_rejected() {
        // header promises 9 bytes of payload, wire carries 4
        let mut wire = Vec::new();
        wire.extend_from_slice(&9u32.to_be_bytes());
        wire.extend_from_slice(&[1, 2, 3, 4]);

        assert!(protocol::read_frame(&mut wire.as_slice()).await.is_err());
    }

    // ============================================================
    // CLIENT TESTS
    // ============================================================

    /// A fake peer that answers every request with `Pong`, echoing the
    /// caller's correlation id.
    async fn spawn_pong_peer() -> PeerHandle {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    while let Ok(frame) = protocol::read_frame(&mut stream).await {
                        let reply =
                            protocol::encode_reply(frame.correlation_id, frame.kind, &Reply::Pong)
                                .unwrap();
                        if protocol::write_frame(&mut stream, &reply).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        PeerHandle::from_endpoint(endpoint)
    }

    #[tokio::test]
    async fn test_call_round_trip_and_connection_reuse() {
        let peer = spawn_pong_peer().await;
        let client = RpcClient::new(Duration::from_millis(500));

        for _ in 0..3 {
            let reply = client.call_default(&peer, Request::Ping).await.unwrap();
            assert!(matches!(reply, Reply::Pong));
        }
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_one_connection() {
        let peer = spawn_pong_peer().await;
        let client = RpcClient::new(Duration::from_millis(500));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let client = client.clone();
            let peer = peer.clone();
            handles.push(tokio::spawn(async move {
                client.call_default(&peer, Request::Ping).await
            }));
        }

        for handle in handles {
            assert!(matches!(handle.await.unwrap(), Ok(Reply::Pong)));
        }
    }

    #[tokio::test]
    async fn test_call_times_out_on_silent_peer() {
        // a listener that accepts and never replies
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let peer = PeerHandle::from_endpoint(endpoint);
        let client = RpcClient::new(Duration::from_millis(100));

        match client.call_default(&peer, Request::Ping).await {
            Err(RpcError::Timeout(ms)) => assert_eq!(ms, 100),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_call_unreachable_peer() {
        // bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());
        drop(listener);

        let peer = PeerHandle::from_endpoint(endpoint);
        let client = RpcClient::new(Duration::from_millis(200));

        let err = client.call_default(&peer, Request::Ping).await.unwrap_err();
        assert!(matches!(err, RpcError::Unreachable(_)), "got {err:?}");
        assert!(err.is_peer_failure());
    }
}
