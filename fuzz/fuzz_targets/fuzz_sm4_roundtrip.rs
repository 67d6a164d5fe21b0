#![no_main]
use libfuzzer_sys::fuzz_target;
use sm4kit_crypto::sm4::{Sm4Key, Sm4Strategy};

fuzz_target!(|data: &[u8]| {
    if data.len() < 32 {
        return;
    }
    let table = Sm4Key::with_strategy(&data[..16], Sm4Strategy::Table).unwrap();
    let accel = Sm4Key::with_strategy(&data[..16], Sm4Strategy::Accelerated).unwrap();

    for chunk in data[16..].chunks_exact(16) {
        let block: [u8; 16] = chunk.try_into().unwrap();
        let mut a = block;
        let mut b = block;
        table.encrypt_block(&mut a);
        accel.encrypt_block(&mut b);
        assert_eq!(a, b);
        table.decrypt_block(&mut a);
        assert_eq!(a, block);
    }
});
