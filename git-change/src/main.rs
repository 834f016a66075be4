fn main() {
    git_change_invoke::invoke_subcommand_main(git_change::commands::command_main)
}
