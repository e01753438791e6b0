//! Property-based tests for identity reply handling.

use launchkey_surface::handshake::{
    HandshakeState, IdentityHandshake, SysexOutcome, DEFAULT_REQUEST_DELAY,
    IDENTITY_RESPONSE_SIGNATURE, PRODUCT_ID_BYTES, PRODUCT_ID_PREFIX,
};
use proptest::prelude::*;
use tokio::time::Instant;

fn awaiting() -> IdentityHandshake {
    let start = Instant::now();
    let mut handshake = IdentityHandshake::default();
    handshake.restart(start);
    handshake.poll(start + DEFAULT_REQUEST_DELAY);
    handshake
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Anything without the identity reply header is left to the default handler.
    #[test]
    fn prop_header_mismatch_is_delegated(bytes in prop::collection::vec(any::<u8>(), 0..32)) {
        prop_assume!(bytes.get(3..5) != Some(&IDENTITY_RESPONSE_SIGNATURE[..]));

        let mut handshake = awaiting();
        let outcome = handshake.handle_sysex(&bytes);

        prop_assert_eq!(outcome, SysexOutcome::Delegated);
        prop_assert_eq!(handshake.state(), HandshakeState::AwaitingResponse);
        prop_assert!(handshake.is_pending());
        prop_assert_eq!(handshake.variant(), None);
    }

    /// A known header with a selector outside the accepted set never identifies.
    #[test]
    fn prop_unknown_selector_is_rejected(
        selector in any::<u8>(),
        tail in prop::collection::vec(0u8..0x80, 0..8),
    ) {
        prop_assume!(!PRODUCT_ID_BYTES.contains(&selector));

        let mut bytes = vec![0xF0, 0x7E, 0x00, 0x06, 0x02];
        bytes.extend_from_slice(&PRODUCT_ID_PREFIX);
        bytes.push(selector);
        bytes.extend_from_slice(&tail);
        bytes.push(0xF7);

        let mut handshake = awaiting();
        prop_assert!(matches!(handshake.handle_sysex(&bytes), SysexOutcome::Rejected(_)));
        prop_assert_eq!(handshake.state(), HandshakeState::AwaitingResponse);
        prop_assert_eq!(handshake.variant(), None);
    }

    /// Every accepted selector identifies exactly once.
    #[test]
    fn prop_accepted_selector_identifies_once(index in 0usize..PRODUCT_ID_BYTES.len()) {
        let mut bytes = vec![0xF0, 0x7E, 0x7F, 0x06, 0x02];
        bytes.extend_from_slice(&PRODUCT_ID_PREFIX);
        bytes.push(PRODUCT_ID_BYTES[index]);
        bytes.push(0xF7);

        let mut handshake = awaiting();
        prop_assert!(matches!(handshake.handle_sysex(&bytes), SysexOutcome::Identified(_)));
        prop_assert!(matches!(handshake.handle_sysex(&bytes), SysexOutcome::Revalidated(_)));
        prop_assert!(!handshake.request_task().is_armed());
    }
}
