use parsik::Parser;
use parsik_example::grammar;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() != 2 {
        eprintln!("Usage {} EXPRESSION", &args[0]);
        std::process::exit(2);
    }

    let input = &args[1];

    println!("parsing: {}", input);

    let res = grammar().and_then(|grammar| Parser::new(&grammar).parse("calculator", input));

    match res {
        Ok(value) => println!("result: {}", value),
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    }
}
