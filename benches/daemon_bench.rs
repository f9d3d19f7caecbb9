use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::collections::HashMap;
use styx_daemon::{Arguments, Daemon, Error, LogConfig, Properties, Resources, DEFAULT_LOGGING_RESOURCE};

fn bench_daemon_creation(c: &mut Criterion) {
    c.bench_function("daemon_creation", |b| {
        b.iter(|| {
            let daemon = Daemon::builder()
                .name("bench-daemon")
                .on_stop(|| ())
                .on_done(|| ())
                .without_signals()
                .build()
                .unwrap();
            black_box(daemon);
        });
    });
}

fn bench_completed_run(c: &mut Criterion) {
    c.bench_function("completed_run", |b| {
        b.iter(|| {
            let daemon = Daemon::builder()
                .on_stop(|| ())
                .without_signals()
                .build()
                .unwrap();
            black_box(daemon.run(|| ()).unwrap());
        });
    });
}

fn bench_termination_handshake(c: &mut Criterion) {
    c.bench_function("termination_handshake", |b| {
        b.iter(|| {
            let daemon = Daemon::builder()
                .on_stop(|| ())
                .without_signals()
                .build()
                .unwrap();
            let handle = daemon.termination_handle();
            let hook = std::thread::spawn(move || handle.terminate());
            black_box(daemon.run(|| ()).unwrap());
            hook.join().unwrap();
        });
    });
}

fn bench_argument_lookup(c: &mut Criterion) {
    let properties = Properties::new();
    properties.load_args(["-Dbench.cache.size=64"]);
    let env: HashMap<String, String> = (0..64)
        .map(|i| (format!("VAR_{i}"), i.to_string()))
        .chain([("BENCH_HOST".to_string(), "localhost".to_string())])
        .collect();
    let args = Arguments::new("bench", ["-verbose=true", "-port=9090"])
        .with_properties(properties)
        .with_env(env);

    c.bench_function("argument_from_command_line", |b| {
        b.iter(|| black_box(args.get_integer(black_box("port")).unwrap()));
    });

    c.bench_function("argument_from_properties", |b| {
        b.iter(|| black_box(args.get_integer(black_box("cache-size")).unwrap()));
    });

    c.bench_function("argument_from_env", |b| {
        b.iter(|| black_box(args.get_string(black_box("host"))));
    });
}

fn bench_logging_config(c: &mut Criterion) {
    let resources = Resources::packaged();

    c.bench_function("logging_config_load", |b| {
        b.iter(|| {
            let config = LogConfig::from_resource(&resources, DEFAULT_LOGGING_RESOURCE).unwrap();
            black_box(config);
        });
    });
}

fn bench_error_creation(c: &mut Criterion) {
    c.bench_function("error_creation", |b| {
        b.iter(|| {
            let err = Error::config(black_box("benchmark error"));
            black_box(err);
        });
    });

    c.bench_function("error_chain", |b| {
        b.iter(|| {
            let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
            let err = Error::init_with_source(black_box("activation failed"), io_err);
            black_box(err);
        });
    });
}

criterion_group!(
    benches,
    bench_daemon_creation,
    bench_completed_run,
    bench_termination_handshake,
    bench_argument_lookup,
    bench_logging_config,
    bench_error_creation
);
criterion_main!(benches);
