#![no_main]

use ferrous_ioc::{InjectFlags, Injector, IocError, Platform, Resolver, Token};
use libfuzzer_sys::fuzz_target;

// Random sequences of scope operations must never panic, and lookups must
// agree with `has`.
fuzz_target!(|data: &[u8]| {
    let root = Injector::root(Platform::builder().build());
    let mut scopes = vec![root.clone()];

    for chunk in data.chunks(3) {
        if chunk.len() < 3 {
            break;
        }
        let target = scopes[chunk[1] as usize % scopes.len()].clone();
        let token = Token::name(format!("t{}", chunk[2] % 8));

        match chunk[0] % 6 {
            0 => {
                if let Ok(child) = target.create_child() {
                    scopes.push(child);
                }
            }
            1 => {
                let _ = target.set_value(token, chunk[2]);
            }
            2 => {
                if !target.ptr_eq(&root) {
                    target.destroy();
                }
            }
            3 => {
                let _ = target.unregister(&token);
            }
            4 => {
                let flags = match chunk[2] % 3 {
                    0 => InjectFlags::DEFAULT,
                    1 => InjectFlags::SELF,
                    _ => InjectFlags::SKIP_SELF,
                };
                let found = target.get_with_flags::<u8>(&token, flags | InjectFlags::OPTIONAL);
                match found {
                    Ok(Some(_)) => assert!(target.has(&token, flags).unwrap()),
                    Ok(None) => assert!(!target.has(&token, flags).unwrap()),
                    Err(IocError::Destroyed(_)) => assert!(target.is_destroyed()),
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            _ => {
                let _ = target.snapshot();
            }
        }
    }

    root.destroy();
    assert!(scopes.iter().all(Injector::is_destroyed));
});
