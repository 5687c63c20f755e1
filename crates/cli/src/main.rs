mod app;
mod args;
mod cmd_dns;
mod cmd_http;

use app::Executable;

fn main() {
    app::exec()
}
