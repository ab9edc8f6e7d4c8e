use colored::Colorize;
use siteline_application::Siteline;

pub fn run(siteline: &Siteline) {
    let removed = siteline.purge();
    println!("{}", format!("Removed {} stored keys", removed).green());
}
