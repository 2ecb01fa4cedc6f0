use std::process::ExitCode;

fn main() -> ExitCode {
    snap_ocr::run()
}
