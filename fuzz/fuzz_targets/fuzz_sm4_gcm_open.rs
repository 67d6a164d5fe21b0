#![no_main]
use libfuzzer_sys::fuzz_target;
use sm4kit_crypto::modes::gcm::Sm4Gcm;
use sm4kit_crypto::CryptoError;

// Layout: key[16] | nonce_len[1] | nonce | aad_len[1] | aad | ct || tag
fuzz_target!(|data: &[u8]| {
    if data.len() < 18 {
        return;
    }
    let (key, rest) = data.split_at(16);
    let nonce_len = (rest[0] as usize).min(rest.len() - 1);
    let (nonce, rest) = rest[1..].split_at(nonce_len);
    let Some((&aad_len, rest)) = rest.split_first() else {
        return;
    };
    let (aad, sealed) = rest.split_at((aad_len as usize).min(rest.len()));

    let Ok(gcm) = Sm4Gcm::new(key) else {
        return;
    };
    if sealed.len() < 16 {
        return;
    }
    let (ct, tag) = sealed.split_at(sealed.len() - 16);
    let tag: [u8; 16] = tag.try_into().unwrap();

    let mut buf = ct.to_vec();
    match gcm.open_in_place(nonce, aad, &mut buf, &tag) {
        Ok(()) => {
            // Whatever opened must re-seal to the same ciphertext and tag.
            let (ct2, tag2) = gcm.seal(nonce, aad, &buf).unwrap();
            assert_eq!(ct2, ct);
            assert_eq!(tag2, tag);
        }
        Err(CryptoError::AuthenticationFailure) => assert_eq!(buf, ct),
        Err(CryptoError::InvalidNonceLength) => assert!(nonce.is_empty()),
        Err(e) => panic!("unexpected error: {e}"),
    }
});
