use criterion::{criterion_group, criterion_main, Criterion};
use syslog_tcp::{Decoder, DuplicateIds};

const INPUTS: [(&str, &str); 3] = [
    (
        "no_sd",
        "<34>1 2003-10-11T22:14:15.003Z mymachine.example.com su - ID47 - BOM'su root' failed for lonvick on /dev/pts/8",
    ),
    (
        "sd",
        r#"<165>1 2003-10-11T22:14:15.003Z mymachine.example.com evntslog - ID47 [exampleSDID@32473 iut="3" eventSource="Application" eventID="1011"][examplePriority@32473 class="high"] BOMAn application event log entry..."#,
    ),
    (
        "nil",
        "<13>1 - - - - - - Test message",
    ),
];

fn parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for (name, input) in INPUTS {
        group.bench_function(format!("own/{name}"), |b| {
            b.iter(|| {
                let _ = syslog_tcp::decode(input.as_bytes());
            })
        });

        group.bench_function(format!("own_merge/{name}"), |b| {
            let decoder = Decoder::new().with_duplicate_ids(DuplicateIds::Merge);
            b.iter(|| {
                let _ = decoder.decode(input.as_bytes());
            })
        });

        group.bench_function(format!("syslog_loose/{name}"), |b| {
            b.iter(|| {
                let _ = syslog_loose::parse_message(input, syslog_loose::Variant::RFC5424);
            })
        });
    }

    group.finish();
}

criterion_group!(benches, parse);
criterion_main!(benches);
