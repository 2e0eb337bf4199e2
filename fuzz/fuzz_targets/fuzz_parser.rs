#![no_main]

use esrun::parser;
use esrun::string_dict::StringDict;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    if source.len() > 100_000 {
        return;
    }

    // Both modes, since strict mode adds its own early errors
    let mut dict = StringDict::new();
    let _ = parser::parse(source, "fuzz.js", false, &mut dict);
    let _ = parser::parse(source, "fuzz.js", true, &mut dict);
});
