use crate::receiver::decrypt::PacketDecryptor;

// NIST SP 800-38A F.2.2 CBC-AES128 decrypt vectors.
const KEY: [u8; 16] = [
    0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f,
    0x3c,
];
const IV: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
    0x0f,
];
const CIPHERTEXT: [u8; 32] = [
    0x76, 0x49, 0xab, 0xac, 0x81, 0x19, 0xb2, 0x46, 0xce, 0xe9, 0x8e, 0x9b, 0x12, 0xe9, 0x19,
    0x7d, 0x50, 0x86, 0xcb, 0x9b, 0x50, 0x72, 0x19, 0xee, 0x95, 0xdb, 0x11, 0x3a, 0x91, 0x76,
    0x78, 0xb2,
];
const PLAINTEXT: [u8; 32] = [
    0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93, 0x17,
    0x2a, 0xae, 0x2d, 0x8a, 0x57, 0x1e, 0x03, 0xac, 0x9c, 0x9e, 0xb7, 0x6f, 0xac, 0x45, 0xaf,
    0x8e, 0x51,
];

#[test]
fn test_decrypt_known_vectors() {
    let decryptor = PacketDecryptor::new(KEY, IV);
    let mut payload = CIPHERTEXT.to_vec();

    decryptor.decrypt(&mut payload);
    assert_eq!(payload, PLAINTEXT);
}

#[test]
fn test_trailing_partial_block_passes_through() {
    let decryptor = PacketDecryptor::new(KEY, IV);
    let mut payload = CIPHERTEXT.to_vec();
    payload.extend_from_slice(&[0xAA, 0xBB, 0xCC]);

    decryptor.decrypt(&mut payload);
    assert_eq!(&payload[..32], &PLAINTEXT[..]);
    assert_eq!(&payload[32..], &[0xAA, 0xBB, 0xCC]);
}

#[test]
fn test_sub_block_payload_untouched() {
    let decryptor = PacketDecryptor::new(KEY, IV);
    let mut payload = vec![1u8, 2, 3, 4, 5];

    decryptor.decrypt(&mut payload);
    assert_eq!(payload, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_decrypt_is_stateless_across_packets() {
    let decryptor = PacketDecryptor::new(KEY, IV);

    let mut first = CIPHERTEXT[..16].to_vec();
    decryptor.decrypt(&mut first);
    // A second packet restarts from the session IV, so the same ciphertext
    // decrypts identically.
    let mut second = CIPHERTEXT[..16].to_vec();
    decryptor.decrypt(&mut second);

    assert_eq!(first, &PLAINTEXT[..16]);
    assert_eq!(first, second);
}
