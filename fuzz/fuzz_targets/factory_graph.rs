#![no_main]

use ferrous_ioc::{Dep, Injector, IocError, Platform, PlatformOptions, ProviderBinding, Resolver, Token};
use libfuzzer_sys::fuzz_target;

// Random factory graphs either resolve or fail with a cycle or depth error.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let nodes = (data[0] % 16 + 1) as usize;
    let platform = Platform::builder()
        .options(PlatformOptions::default().max_depth(32))
        .build();
    let root = Injector::root(platform);

    let mut edges = vec![Vec::new(); nodes];
    for pair in data[1..].chunks(2) {
        if let [from, to] = pair {
            edges[*from as usize % nodes].push(*to as usize % nodes);
        }
    }

    let bindings: Vec<_> = edges
        .iter()
        .enumerate()
        .map(|(i, deps)| {
            let deps = deps.iter().map(|d| Dep::token(Token::name(format!("n{d}")))).collect();
            let binding = ProviderBinding::factory(Token::name(format!("n{i}")), deps, |args| {
                let mut sum = 1u64;
                for index in 0..args.len() {
                    sum = sum.wrapping_add(*args.get::<u64>(index)?);
                }
                Ok(sum)
            });
            if i % 2 == 0 {
                binding.as_static()
            } else {
                binding
            }
        })
        .collect();
    root.inject(bindings).unwrap();

    for i in 0..nodes {
        match root.get_token::<u64>(&Token::name(format!("n{i}"))) {
            Ok(_) | Err(IocError::Circular(_)) | Err(IocError::DepthExceeded(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
});
