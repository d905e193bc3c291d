use clap::Parser;
use streamcall_client::{
    CalculatorCaller, ClientArgs, ClientConfig, GreetCaller, client::greet::greeting,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let config = ClientConfig::try_from(ClientArgs::parse())?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339()),
        )
        .try_init()?;

    tracing::info!("Connecting to {}", config.server_url);
    let channel = config.connect().await?;
    let calculator = CalculatorCaller::new(channel.clone(), &config);
    let greeter = GreetCaller::new(channel, &config);

    run_calculator(&calculator).await?;
    run_greet(&greeter, &config).await?;

    tracing::info!("All calls completed");
    Ok(())
}

async fn run_calculator(calculator: &CalculatorCaller) -> anyhow::Result<()> {
    let sum = calculator.sum(3, 10).await?;
    tracing::info!("Sum: 3 + 10 = {sum}");

    let factors = calculator.prime_factors(12).await.into_result()?;
    tracing::info!("PrimeNumberDecomposition: 12 = {factors:?}");

    let average = calculator.compute_average(vec![3, 5, 9, 54, 23]).await?;
    tracing::info!("ComputeAverage: {average}");

    let maxima = calculator
        .find_maximum(vec![4, 7, 2, 19, 4, 6, 32])
        .await
        .into_result()?;
    tracing::info!("FindMaximum: {maxima:?}");

    for number in [10, -2] {
        match calculator.square_root(number).await {
            Ok(root) => tracing::info!("SquareRoot: sqrt({number}) = {root}"),
            Err(e @ streamcall_core::Error::InvalidArgument { .. }) => {
                tracing::warn!("SquareRoot({number}) rejected: {e}");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

async fn run_greet(greeter: &GreetCaller, config: &ClientConfig) -> anyhow::Result<()> {
    let result = greeter.greet(greeting("Tom", "Buchaillot")).await?;
    tracing::info!("Greet: {result}");

    greeter
        .greet_many_times(greeting("Tom", "Buchaillot"), |message| {
            tracing::info!("GreetManyTimes: {message}");
        })
        .await
        .outcome?;

    let friends = || {
        ["Tomas", "Chris", "Nana", "Tomas again"]
            .into_iter()
            .map(|first| greeting(first, ""))
            .collect::<Vec<_>>()
    };

    let result = greeter.long_greet(friends()).await?;
    tracing::info!("LongGreet: {result}");

    greeter
        .greet_everyone(friends(), |reply| tracing::info!("GreetEveryone: {reply}"))
        .await
        .outcome?;

    for budget in [config.short_deadline, config.long_deadline] {
        match greeter
            .greet_with_deadline(greeting("Tom", "Buchaillot"), budget)
            .await
        {
            Ok(result) => tracing::info!("GreetWithDeadline ({budget:?}): {result}"),
            Err(e) if e.is_deadline_exceeded() => {
                tracing::warn!("GreetWithDeadline ({budget:?}): deadline was exceeded");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
